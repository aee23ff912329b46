pub fn run() -> anyhow::Result<()> {
    println!("kogaro {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
