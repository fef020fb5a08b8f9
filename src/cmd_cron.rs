//! `cron --show | --install | --uninstall`.

use clawgate_jobs::JobStore;

use crate::cli::CronArgs;
use crate::context::AppContext;
use crate::exit::{CliResult, ErrorCode};

pub(crate) async fn handle_cron_command(ctx: &AppContext, args: CronArgs) -> CliResult {
    if args.install {
        install(ctx).await
    } else if args.uninstall {
        let removed = ctx.crontab.uninstall()?;
        println!(
            "Removed {removed} entr{} from {}",
            if removed == 1 { "y" } else { "ies" },
            ctx.crontab.backend().describe()
        );
        Ok(ErrorCode::Success)
    } else {
        show(ctx)
    }
}

async fn install(ctx: &AppContext) -> CliResult {
    let jobs = ctx.store.list().await?;
    let installed = ctx.crontab.install(&jobs)?;
    let skipped = jobs.len() - installed;

    println!(
        "Installed {installed} entr{} into {}",
        if installed == 1 { "y" } else { "ies" },
        ctx.crontab.backend().describe()
    );
    if skipped > 0 {
        println!("Skipped {skipped} disabled job(s)");
    }
    Ok(ErrorCode::Success)
}

fn show(ctx: &AppContext) -> CliResult {
    let entries = ctx.crontab.list()?;
    println!("# {}", ctx.crontab.backend().describe());
    if entries.is_empty() {
        println!("# no ClawGate entries installed");
        return Ok(ErrorCode::Success);
    }
    print!("{}", ctx.crontab.render_region()?);
    Ok(ErrorCode::Success)
}
