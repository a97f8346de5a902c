//! ZGEO 命令行工具
//!
//! - `zgeo replay <session.json>`: 重放会话中的动作日志并输出溯源报告
//! - `zgeo simplify <expr>`: 化简单个坐标表达式

mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zgeo_core::engine::ConstructionEngine;
use zgeo_core::simplify::Simplifier;

use crate::session::{load_config, Session};

/// ZGEO - 尺规作图点的溯源与精确坐标
#[derive(Parser, Debug)]
#[command(name = "zgeo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 日志详细程度（-v 为 info，-vv 为 debug）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 重放会话文件并输出每个点的溯源
    Replay {
        /// 会话文件（点集与动作日志）
        session: PathBuf,

        /// 引擎配置文件（JSON）
        #[arg(long)]
        config: Option<PathBuf>,

        /// 化简全部已解析的坐标
        #[arg(long)]
        simplify: bool,

        /// 以 JSON 输出报告
        #[arg(long)]
        json: bool,
    },

    /// 化简一个坐标表达式，例如 `sqrt(3/4)`
    Simplify {
        expr: String,
    },
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn replay(session: PathBuf, config: Option<PathBuf>, simplify: bool, json: bool) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let session = Session::load(&session)?;
    let store = session.store();

    let mut engine = ConstructionEngine::new(config);
    let report = engine.replay_log(&session.log, &store)?;
    for diagnostic in report.diagnostics() {
        warn!("{}", diagnostic.message);
    }
    if !report.unattributed.is_empty() {
        warn!("Unattributed points: {:?}", report.unattributed);
    }
    if simplify {
        engine.simplify_all(false);
    }

    let construction = engine.report(&store);
    if json {
        println!("{}", serde_json::to_string_pretty(&construction)?);
    } else {
        print!("{}", construction.render_text());
    }
    info!(
        "Replayed {} actions, {} points",
        construction.actions,
        construction.points.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志，输出到 stderr 以免混入报告
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(log_level(cli.verbose))
            .with_writer(std::io::stderr)
            .finish(),
    )?;

    match cli.command {
        Command::Replay {
            session,
            config,
            simplify,
            json,
        } => replay(session, config, simplify, json),
        Command::Simplify { expr } => {
            let simplifier = Simplifier::default();
            info!("Simplifying with {} backend", simplifier.backend_name());
            println!("{}", simplifier.simplify(&expr));
            Ok(())
        }
    }
}
