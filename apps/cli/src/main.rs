use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use searchdeck_core_sdk::config::AppConfig;
use searchdeck_core_sdk::shell::{App, Clients, Notice, NoticeLevel, QueryOutcome};
use searchdeck_core_sdk::{db, server, telemetry};

/**
 * \brief CLI 程序入口：保存凭据、查询部署、交互外壳与本地页面。
 */
#[derive(Parser, Debug)]
#[command(
    name = "searchdeck",
    version,
    about = "Search with an IBM GenAI deployment"
)]
struct Cli {
    /** \brief 凭据库路径，默认读取 SEARCHDECK_DB 或 ./api_data.db */
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 保存 API Key 与部署地址。
     */
    Save {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        endpoint_url: String,
    },

    /**
     * \brief 显示当前预填的凭据（Key 已遮蔽）。
     */
    Show,

    /**
     * \brief 发送一次查询并打印渲染结果。
     */
    Query {
        query: String,
        /** \brief 覆盖已保存的 API Key（不写库） */
        #[arg(long)]
        api_key: Option<String>,
        /** \brief 覆盖已保存的部署地址（不写库） */
        #[arg(long)]
        endpoint_url: Option<String>,
    },

    /**
     * \brief 交互式外壳。
     */
    Shell,

    /**
     * \brief 启动本地 HTTP 服务并提供表单页面。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:8501")]
        addr: String,
    },

    /**
     * \brief 开关本地遥测日志。
     */
    Telemetry {
        #[arg(value_enum)]
        state: Switch,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(path) = cli.db {
        config.db_path = path;
    }
    telemetry::set_log_dir(config.log_dir.clone());

    let conn = db::open_db(&config.db_path).context("open database failed")?;
    db::migrate(&conn).context("apply migrations failed")?;
    telemetry::set_enabled(db::get_telemetry_enabled(&conn).unwrap_or(false));

    match cli.command {
        Commands::Serve { addr } => {
            drop(conn);
            server::run(&addr, config).await?;
        }
        Commands::Telemetry { state } => {
            let enabled = matches!(state, Switch::On);
            db::set_telemetry_enabled(&conn, enabled).context("save telemetry failed")?;
            telemetry::set_enabled(enabled);
            println!("Telemetry {}", if enabled { "enabled" } else { "disabled" });
        }
        Commands::Save {
            api_key,
            endpoint_url,
        } => {
            let mut app = open_app(conn, &config)?;
            app.set_api_key(api_key);
            app.set_endpoint_url(endpoint_url);
            let notice = app.save().context("save credentials failed")?;
            print_notice(&notice);
        }
        Commands::Show => show_state(&open_app(conn, &config)?),
        Commands::Query {
            query,
            api_key,
            endpoint_url,
        } => {
            let mut app = open_app(conn, &config)?;
            if let Some(key) = api_key {
                app.set_api_key(key);
            }
            if let Some(url) = endpoint_url {
                app.set_endpoint_url(url);
            }
            let outcome = app.query(&query).await;
            print_outcome(&outcome);
            if !outcome.is_ok() {
                bail!("search did not complete");
            }
        }
        Commands::Shell => {
            let mut app = open_app(conn, &config)?;
            run_shell(&mut app).await?;
        }
    }

    Ok(())
}

fn open_app(conn: db::Connection, config: &AppConfig) -> Result<App> {
    App::new(conn, Clients::from_config(config)).context("load credentials failed")
}

/**
 * \brief 外壳内的一行输入。
 */
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    SetKey(String),
    SetUrl(String),
    Save,
    Show,
    Help,
    Quit,
    Query(String),
    Unknown(String),
}

fn parse_command(line: &str) -> ShellCommand {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return ShellCommand::Query(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "key" => ShellCommand::SetKey(arg.to_string()),
        "url" => ShellCommand::SetUrl(arg.to_string()),
        "save" => ShellCommand::Save,
        "show" => ShellCommand::Show,
        "help" | "h" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        other => ShellCommand::Unknown(other.to_string()),
    }
}

async fn run_shell(app: &mut App) -> Result<()> {
    println!("Search with IBM GenAI Model");
    show_state(app);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("search> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await.context("read input failed")? else {
            println!();
            break;
        };
        match parse_command(&line) {
            ShellCommand::SetKey(key) => {
                app.set_api_key(key);
                println!("API key set ({})", telemetry::mask_secret(&app.state().api_key));
            }
            ShellCommand::SetUrl(url) => {
                app.set_endpoint_url(url);
                println!("Deployment URL set");
            }
            ShellCommand::Save => match app.save() {
                Ok(notice) => print_notice(&notice),
                Err(err) => print_notice(&Notice::error(err.to_string())),
            },
            ShellCommand::Show => show_state(app),
            ShellCommand::Help => print_help(),
            ShellCommand::Quit => break,
            ShellCommand::Query(query) => print_outcome(&app.query(&query).await),
            ShellCommand::Unknown(name) => {
                print_notice(&Notice::warning(format!("unknown command :{}", name)))
            }
        }
    }
    Ok(())
}

fn show_state(app: &App) {
    let state = app.state();
    let key = if state.api_key.is_empty() {
        "(not set)".to_string()
    } else {
        telemetry::mask_secret(&state.api_key)
    };
    println!("API key:        {}", key);
    println!("Deployment URL: {}", state.endpoint_url);
}

fn print_help() {
    println!("Type a search query, or one of:");
    println!("  :key <api key>     set the API key");
    println!("  :url <endpoint>    set the deployment URL");
    println!("  :save              save API key and URL");
    println!("  :show              show current values");
    println!("  :quit              leave the shell");
}

fn print_outcome(outcome: &QueryOutcome) {
    for notice in &outcome.notices {
        print_notice(notice);
    }
    if let Some(text) = &outcome.rendered {
        print!("{}", text);
        std::io::stdout().flush().ok();
    }
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Success => println!("[ok] {}", notice.text),
        NoticeLevel::Info => println!("[info] {}", notice.text),
        NoticeLevel::Warning => eprintln!("[warn] {}", notice.text),
        NoticeLevel::Error => eprintln!("[error] {}", notice.text),
    }
}
