use super::Exit;

pub fn run() -> anyhow::Result<Exit> {
    println!("recall {}", env!("CARGO_PKG_VERSION"));
    println!(
        "store schema v{}",
        recall_store::migrations::latest_version()
    );
    Ok(Exit::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_output() {
        assert_eq!(run().unwrap(), Exit::Ok);
    }
}
