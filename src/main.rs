fn setup_environment() {
    std::env::remove_var("PYTHONHOME");
    std::env::remove_var("PYTHONPATH");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_environment();
    tubegrab_lib::run().await
}
