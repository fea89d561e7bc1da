use anyhow::Result;
use clap::Subcommand;

use crate::licensing::manager::{LicenseInfo, LicenseManager};

use super::AppContext;

#[derive(Debug, Subcommand)]
pub enum LicenseCommand {
    #[command(about = "Show whether this machine is licensed")]
    Status,
    #[command(about = "Activate the license with a promo code")]
    Activate { code: String },
    #[command(about = "Remove the license from this machine")]
    Revoke,
}

fn describe(info: &LicenseInfo) -> String {
    if !info.licensed {
        return "Not licensed".into();
    }
    let kind = info.license_type.as_deref().unwrap_or("unknown");
    match info.activated_at {
        Some(at) => format!("Licensed ({kind}), activated {}", at.format("%B %d, %Y %H:%M")),
        None => format!("Licensed ({kind})"),
    }
}

pub fn process_license_command(command: LicenseCommand, context: &AppContext) -> Result<()> {
    let mut manager = LicenseManager::load(
        &context.app_dir,
        context.config.licensing.promo_code_hashes.clone(),
    );
    match command {
        LicenseCommand::Status => {}
        LicenseCommand::Activate { code } => manager.activate_with_promo(&code)?,
        LicenseCommand::Revoke => manager.revoke()?,
    }
    println!("{}", describe(&manager.info()));
    Ok(())
}
