//! The `checks` command: show the effective registry.

use anyhow::Result;
use gauntlet::config::GateConfig;
use gauntlet::ui;
use std::path::Path;

pub fn cmd_checks(project_root: &Path) -> Result<()> {
    let config = GateConfig::load(project_root)?;
    let registry = config.registry(project_root)?;
    if config.checks.is_empty() && !registry.is_empty() {
        println!("Checks auto-detected from project tooling:\n");
    }
    println!("{}", ui::render_registry(&registry));
    Ok(())
}
