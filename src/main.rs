// ==========================================
// 表格数据导入工具 - 命令行入口
// ==========================================
// 退出码: 0 已保存 / 1 导入失败 / 2 用户取消
// ==========================================

use anyhow::Context;
use clap::Parser;
use sheet_importer::config::{CliOverrides, ConfigManager, ImportSettings};
use sheet_importer::i18n::{set_locale, t_with_args};
use sheet_importer::importer::{
    run_import, AutoConfirm, ConsoleReporter, ImportError, ImportRequest, ModelOrder,
    StdinConfirmation, UserConfirmation,
};
use sheet_importer::{logging, SchemaRegistry, SqliteObjectStore};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "sheet-importer", version)]
#[command(about = "按字段映射将 Excel/CSV 行导入对象存储", long_about = None)]
struct Cli {
    /// 待导入的表格文件（.xlsx/.xls/.xlsm/.ods/.csv）
    import_file: PathBuf,

    /// 对象模型定义（JSON）
    #[arg(long)]
    schema: Option<PathBuf>,

    /// SQLite 数据库路径
    #[arg(long, env = "SHEET_IMPORTER_DB_PATH")]
    db: Option<PathBuf>,

    /// 行区间 START:END（可重复，1 起始，闭区间，可省略任一端，可为负数）
    #[arg(long = "rows", value_name = "START:END")]
    rows: Vec<String>,

    /// 字段映射 [+]app.Model[.group].field:expression（可重复）
    #[arg(long = "field", value_name = "SPEC:EXPR", required = true)]
    fields: Vec<String>,

    /// 工作表序号（1 起始）或名称
    #[arg(long)]
    sheet: Option<String>,

    /// 跳过保存确认
    #[arg(short, long)]
    yes: bool,

    /// 每行内模型的处理顺序（declaration / dependency）
    #[arg(long)]
    order: Option<ModelOrder>,

    /// 报告语言（zh-CN / en）
    #[arg(long)]
    locale: Option<String>,

    /// 将会话汇总写入 JSON 文件
    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,

    /// 日志输出为 JSON
    #[arg(long)]
    log_json: bool,
}

/// 默认数据库路径（用户数据目录）
fn default_db_path() -> PathBuf {
    let mut path = PathBuf::from("./sheet_importer.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("sheet-importer");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("sheet_importer.db");
        }
    }

    path
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let db_path = cli.db.unwrap_or_else(default_db_path);
    let db_path_str = db_path.to_string_lossy().to_string();
    tracing::info!("使用数据库: {}", db_path_str);

    // === 配置 ===
    let settings = {
        let config = ConfigManager::new(&db_path_str).context("无法打开配置库")?;
        let overrides = CliOverrides {
            schema_path: cli.schema,
            assume_yes: cli.yes,
            sheet: cli.sheet,
            order: cli.order,
            locale: cli.locale,
        };
        ImportSettings::resolve(overrides, &config)?
    };
    set_locale(&settings.locale);

    // === 对象存储 ===
    let schema = SchemaRegistry::from_path(&settings.schema_path)
        .with_context(|| format!("无法加载对象模型: {}", settings.schema_path.display()))?;
    let store = SqliteObjectStore::open(&db_path_str, schema).context("无法打开对象存储")?;

    let request = ImportRequest {
        sheet: settings.sheet,
        ranges: cli.rows,
        fields: cli.fields,
        order: settings.order,
    };

    let confirmation: Box<dyn UserConfirmation> = if settings.assume_yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinConfirmation::stdin())
    };
    let mut reporter = ConsoleReporter::new(io::stdout());

    match run_import(
        &store,
        &cli.import_file,
        &request,
        &mut reporter,
        confirmation.as_ref(),
    ) {
        Ok(summary) => {
            println!(
                "{}",
                t_with_args("cli.committed", &[("session", summary.session_id.as_str())])
            );
            if let Some(path) = cli.report_json {
                let json = serde_json::to_string_pretty(&summary)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("无法写入报告: {}", path.display()))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ImportError::UserCancelled) => {
            println!("{}", t_with_args("cli.cancelled", &[]));
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    tracing::info!("{} v{}", sheet_importer::APP_NAME, sheet_importer::VERSION);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!(
                "{}",
                t_with_args("cli.failed", &[("error", &format!("{:#}", e))])
            );
            ExitCode::from(1)
        }
    }
}
