use anyhow::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if !xlsx_sheet_rename::cli::run()? {
        std::process::exit(1);
    }
    Ok(())
}
