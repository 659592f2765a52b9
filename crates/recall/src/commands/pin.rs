use super::{Env, Exit};
use recall_store::StorageError;

pub fn pin(id: i64, note: Option<&str>) -> anyhow::Result<Exit> {
    let store = Env::load()?.open_store()?;
    match store.pin(id, note) {
        Ok(()) => {
            println!("pinned observation {id}");
            Ok(Exit::Ok)
        }
        Err(StorageError::NotFound(what)) => {
            eprintln!("recall: {what} not found");
            Ok(Exit::Problem)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn unpin(id: i64) -> anyhow::Result<Exit> {
    let store = Env::load()?.open_store()?;
    if store.unpin(id)? {
        println!("unpinned observation {id}");
        Ok(Exit::Ok)
    } else {
        eprintln!("recall: observation {id} is not pinned");
        Ok(Exit::Problem)
    }
}
