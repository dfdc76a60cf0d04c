use std::io::Write;

use anyhow::Result;

use crate::config::LumaraConfig;

pub async fn run(config: &LumaraConfig, yes: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    println!("This will delete ALL cached embeddings in {}", db_path.display());

    if !yes {
        print!("Type YES to confirm: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        if line.trim() != "YES" {
            println!("Aborted.");
            return Ok(());
        }
    }

    let service = super::build_service(config);
    service.cache().clear().await;
    println!("Cache cleared.");
    Ok(())
}
