mod commands;
mod utils;

use cirrus_cloud::ProviderSettings;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(about = "Bootstrap and manage OpenStack environments", long_about = None)]
struct Cli {
    /// 環境名 (environments.yaml のキー、CIRRUS_ENV 環境変数)
    #[arg(short, long, global = true, env = "CIRRUS_ENV")]
    environment: Option<String>,

    /// インメモリのコンピュートバックエンドとストレージを使う
    #[arg(long, global = true)]
    local: bool,

    /// すべてのバックエンド呼び出しで短いタイムアウトを使う
    #[arg(long, global = true)]
    short_timeouts: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 環境の最初の制御インスタンスを起動
    Bootstrap {
        /// 制御インスタンスにパブリックIPを付けない
        #[arg(long)]
        no_public_ip: bool,
    },
    /// IDでインスタンスを検索
    Instances {
        /// インスタンスID（この順で表示）
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// 環境の状態サーバーとインスタンスを表示
    Status,
    /// マシンのインスタンスを起動
    Start {
        /// マシンID (例: "1")
        machine_id: String,
        /// パブリックIPを付けない
        #[arg(long)]
        no_public_ip: bool,
    },
    /// インスタンスを停止
    Stop {
        /// インスタンスID
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// 全インスタンスを停止し、プロバイダ状態を削除
    Destroy {
        /// 確認プロンプトをスキップ
        #[arg(short, long)]
        yes: bool,
    },
    /// このインスタンスのメタデータを表示
    Metadata {
        /// メタデータサービスに問い合わせず固定のテスト値を返す
        #[arg(long)]
        fixed: bool,
        /// メタデータサービスのエンドポイント
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr へ（stdout はコマンド出力用）
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let settings = ProviderSettings::shared();
    settings.use_short_timeouts(cli.short_timeouts);

    match cli.command {
        Commands::Version => {
            println!("cirrus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Metadata { fixed, endpoint } => {
            commands::metadata::handle(settings, fixed, endpoint).await
        }
        command => {
            let env = utils::open_environ(cli.environment.as_deref(), cli.local, settings)?;
            match command {
                Commands::Bootstrap { no_public_ip } => {
                    commands::bootstrap::handle(&env, no_public_ip).await
                }
                Commands::Instances { ids } => commands::instances::handle(&env, &ids).await,
                Commands::Status => commands::status::handle(&env).await,
                Commands::Start {
                    machine_id,
                    no_public_ip,
                } => commands::start::handle(&env, &machine_id, no_public_ip).await,
                Commands::Stop { ids } => commands::stop::handle(&env, &ids).await,
                Commands::Destroy { yes } => commands::destroy::handle(&env, yes).await,
                Commands::Version | Commands::Metadata { .. } => Ok(()),
            }
        }
    }
}
