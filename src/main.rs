//! 命令行入口 (CLI Entrypoint)
//!
//! 从 `config.toml` 与 `BIZHTTP_*` 环境变量加载配置，发出一次请求并以 JSON 打印归一化后的响应。

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use bizhttp::{ApiResponse, CallOptions, ClientConfig, ClientSettings, Hooks, create_client};

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 发起 GET 请求
    Get {
        url: String,
        /// 查询参数 (KEY=VALUE)
        #[arg(short, long, value_parser = parse_key_val)]
        params: Vec<(String, String)>,
        /// 附加请求头 (KEY=VALUE)
        #[arg(short = 'H', long, value_parser = parse_key_val)]
        header: Vec<(String, String)>,
    },
    /// 发起 POST 请求
    Post {
        url: String,
        /// JSON 请求体
        #[arg(short, long)]
        data: Option<String>,
        /// 附加请求头 (KEY=VALUE)
        #[arg(short = 'H', long, value_parser = parse_key_val)]
        header: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = ClientSettings::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if settings.use_encrypt || settings.use_sign {
        bail!("the CLI has no built-in cipher, disable use_encrypt/use_sign");
    }

    let hooks = Hooks::new()
        .with_on_fail(|msg, resp| warn!("请求失败: {} (status={:?})", msg, resp.status))
        .with_on_invalid_token(|resp| warn!("登录信息已失效: {:?}", resp.msg));
    let client = create_client(ClientConfig::new(settings).with_hooks(hooks))?;

    let resp = match cli.command {
        Commands::Get { url, params, header } => {
            let params: Map<String, Value> = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            client.set_headers(header.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            client.get(&url, Value::Object(params), CallOptions::default()).await?
        }
        Commands::Post { url, data, header } => {
            let body = match data {
                Some(raw) => serde_json::from_str(&raw).context("--data must be valid JSON")?,
                None => Value::Null,
            };
            client.set_headers(header.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            client.post(&url, body, CallOptions::default()).await?
        }
    };

    info!("completed in {} ms", resp.duration.as_millis());
    println!("{}", serde_json::to_string_pretty(&summary(&resp))?);
    Ok(())
}

fn summary(resp: &ApiResponse) -> Value {
    json!({
        "ok": resp.ok,
        "status": resp.status,
        "problem": resp.problem.map(|p| p.to_string()),
        "success": resp.success,
        "code": resp.code,
        "msg": resp.msg,
        "data": resp.data,
        "durationMs": resp.duration.as_millis() as u64,
    })
}

/// 执行 KEY=VALUE 格式参数解析
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no = found in {}", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
