use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use exames_core::validation::{parse_date, preview_expiry};
use exames_core::{
    classify, Clock, CoreConfig, ExamService, ExamUpdate, FixedClock, LogTransport, Money,
    NewExam, NotificationService, NotificationTransport, OutboxTransport, RecordStore,
    SnapshotStore, SystemClock, TenantOutcome,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "exames")]
#[command(about = "Occupational-health exam expiry tracking CLI")]
struct Cli {
    /// Use this day as "today" instead of the system clock (YYYY-MM-DD)
    #[arg(long, global = true)]
    today: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an expiry date
    Classify {
        /// Expiry date (YYYY-MM-DD)
        expiry_date: String,
        /// Alert threshold in days
        #[arg(long, default_value_t = exames_core::constants::DEFAULT_ALERT_THRESHOLD_DAYS)]
        threshold: u32,
    },
    /// Show the expiry date a registration would store
    DeriveExpiry {
        /// Realization date (YYYY-MM-DD)
        realization_date: String,
        /// Validity in days
        validity_days: Option<u32>,
        /// Explicit expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry_date: Option<String>,
    },
    /// Show a tenant's dashboard
    Dashboard {
        /// Tenant id
        tenant_id: String,
    },
    /// Show a tenant's colaborador × procedure matrix
    Procedures {
        /// Tenant id
        tenant_id: String,
    },
    /// List a tenant's exams, history included
    Exams {
        /// Tenant id
        tenant_id: String,
        /// Only this colaborador's exams
        #[arg(long)]
        colaborador: Option<String>,
    },
    /// Register an exam
    Register {
        /// Colaborador id
        colaborador_id: String,
        /// Exam type id
        exam_type_id: String,
        /// Realization date (YYYY-MM-DD)
        realization_date: String,
        /// Validity in days
        #[arg(long)]
        validity_days: Option<u32>,
        /// Explicit expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry_date: Option<String>,
        /// Procedure ids (comma-separated)
        #[arg(long)]
        procedures: Option<String>,
        /// Cost in reais
        #[arg(long)]
        value: Option<f64>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Register the renewal of an exam
    Renew {
        /// Exam id being renewed
        exam_id: String,
        /// Realization date of the renewal (YYYY-MM-DD)
        realization_date: String,
        /// Validity in days (defaults to the previous validity)
        #[arg(long)]
        validity_days: Option<u32>,
    },
    /// Edit an exam
    Update {
        /// Exam id
        exam_id: String,
        /// New realization date (YYYY-MM-DD)
        #[arg(long)]
        realization_date: Option<String>,
        /// New validity in days
        #[arg(long)]
        validity_days: Option<u32>,
        /// New explicit expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry_date: Option<String>,
        /// Replacement procedure ids (comma-separated)
        #[arg(long)]
        procedures: Option<String>,
        /// New cost in reais
        #[arg(long)]
        value: Option<f64>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Send expiry alerts to every tenant
    Notify {
        /// Log the alerts instead of writing them to the outbox
        #[arg(long)]
        dry_run: bool,
    },
}

fn procedure_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_value(value: Option<f64>) -> Result<Option<Money>, Box<dyn std::error::Error>> {
    match value {
        Some(reais) => Ok(Some(
            Money::from_reais(reais).ok_or("value must be a finite amount")?,
        )),
        None => Ok(None),
    }
}

fn load_config() -> Result<CoreConfig, Box<dyn std::error::Error>> {
    Ok(CoreConfig::from_values(
        std::env::var("EXAMES_SNAPSHOT").ok(),
        std::env::var("EXAMES_OUTBOX_DIR").ok(),
        std::env::var("EXAMES_UTC_OFFSET").ok(),
        std::env::var("EXAMES_NOTIFY_INTERVAL_SECS").ok(),
        std::env::var("EXAMES_SENDER").ok(),
    )?)
}

fn today(cfg: &CoreConfig, override_day: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    let clock: Box<dyn Clock> = match override_day {
        Some(day) => Box::new(FixedClock(parse_date("today", day)?)),
        None => Box::new(SystemClock::new(cfg.reference_offset())),
    };
    Ok(clock.today())
}

fn open_store(cfg: &CoreConfig) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SnapshotStore::open(cfg.snapshot_path())?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config()?;
    let today = today(&cfg, cli.today.as_deref())?;

    match cli.command {
        Some(Commands::Classify {
            expiry_date,
            threshold,
        }) => {
            let expiry_date = parse_date("expiry_date", &expiry_date)?;
            let c = classify(expiry_date, threshold, today);
            println!(
                "{} ({}), days to expire: {}",
                c.status,
                c.status.label(),
                c.days_to_expire
            );
        }
        Some(Commands::DeriveExpiry {
            realization_date,
            validity_days,
            expiry_date,
        }) => match preview_expiry(&realization_date, validity_days, expiry_date.as_deref()) {
            Ok(expiry) => println!("Expiry date: {}", expiry),
            Err(e) => eprintln!("Error deriving expiry date: {}", e),
        },
        Some(Commands::Dashboard { tenant_id }) => {
            let service = ExamService::new(open_store(&cfg)?);
            match service.dashboard(&tenant_id, today) {
                Ok(summary) => {
                    println!("Dashboard for {} on {}", tenant_id, summary.generated_on);
                    println!("  Active colaboradores: {}", summary.active_colaboradores);
                    println!("  Active exams:         {}", summary.active_exams);
                    println!("  Expiring soon:        {}", summary.expiring_soon);
                    println!("  Expired:              {}", summary.expired);
                    println!("  Total cost:           {}", summary.total_cost);
                    for item in summary.attention {
                        println!(
                            "  ! {} - {} - {} ({} days)",
                            item.colaborador_name,
                            item.exam_label,
                            item.expiry_date,
                            item.view.days_to_expire
                        );
                    }
                }
                Err(e) => eprintln!("Error building dashboard: {}", e),
            }
        }
        Some(Commands::Procedures { tenant_id }) => {
            let service = ExamService::new(open_store(&cfg)?);
            match service.procedure_matrix(&tenant_id, today) {
                Ok(matrix) => {
                    for row in matrix.rows {
                        println!("{}", row.colaborador_name);
                        for (procedure, cell) in matrix.procedures.iter().zip(row.cells) {
                            match cell {
                                Some(cell) => println!(
                                    "  {}: {} until {} ({} days)",
                                    procedure.name, cell.status, cell.expiry_date, cell.days_to_expire
                                ),
                                None => println!("  {}: -", procedure.name),
                            }
                        }
                    }
                }
                Err(e) => eprintln!("Error building procedure matrix: {}", e),
            }
        }
        Some(Commands::Exams {
            tenant_id,
            colaborador,
        }) => {
            let service = ExamService::new(open_store(&cfg)?);
            match service.exams(&tenant_id, colaborador.as_deref(), today) {
                Ok(entries) if entries.is_empty() => println!("No exams found."),
                Ok(entries) => {
                    for entry in entries {
                        println!(
                            "ID: {}, Colaborador: {}, Exam: {}, Expiry: {}, Status: {}{}",
                            entry.view.record.id,
                            entry.colaborador_name,
                            entry.exam_label,
                            entry.view.record.expiry_date,
                            entry.view.status,
                            if entry.active { "" } else { " (historical)" }
                        );
                    }
                }
                Err(e) => eprintln!("Error listing exams: {}", e),
            }
        }
        Some(Commands::Register {
            colaborador_id,
            exam_type_id,
            realization_date,
            validity_days,
            expiry_date,
            procedures,
            value,
            notes,
        }) => {
            let value = parse_value(value)?;
            let procedure_ids = procedures.as_deref().map(procedure_list).unwrap_or_default();

            let service = ExamService::new(open_store(&cfg)?);
            let exam = NewExam {
                colaborador_id,
                exam_type_id,
                procedure_ids,
                realization_date,
                validity_days,
                expiry_date,
                value,
                notes,
            };
            match service.register(exam) {
                Ok(record) => println!(
                    "Registered exam {} expiring on {}",
                    record.id, record.expiry_date
                ),
                Err(e) => eprintln!("Error registering exam: {}", e),
            }
        }
        Some(Commands::Renew {
            exam_id,
            realization_date,
            validity_days,
        }) => {
            let service = ExamService::new(open_store(&cfg)?);
            match service.renew(&exam_id, &realization_date, validity_days) {
                Ok(record) => println!(
                    "Renewed {} as {} expiring on {}",
                    exam_id, record.id, record.expiry_date
                ),
                Err(e) => eprintln!("Error renewing exam: {}", e),
            }
        }
        Some(Commands::Update {
            exam_id,
            realization_date,
            validity_days,
            expiry_date,
            procedures,
            value,
            notes,
        }) => {
            let service = ExamService::new(open_store(&cfg)?);
            let update = ExamUpdate {
                realization_date,
                validity_days,
                expiry_date,
                procedure_ids: procedures.as_deref().map(procedure_list),
                value: parse_value(value)?,
                notes,
            };
            match service.update(&exam_id, update) {
                Ok(record) => println!("Updated {} expiring on {}", record.id, record.expiry_date),
                Err(e) => eprintln!("Error updating exam: {}", e),
            }
        }
        Some(Commands::Notify { dry_run }) => {
            let transport: Arc<dyn NotificationTransport> = if dry_run {
                Arc::new(LogTransport)
            } else {
                Arc::new(OutboxTransport::new(cfg.outbox_dir(), cfg.sender().clone()))
            };
            let service = NotificationService::new(open_store(&cfg)?, transport);
            match service.run(today) {
                Ok(report) => {
                    for tenant in &report.tenants {
                        let outcome = match &tenant.outcome {
                            TenantOutcome::Sent { recipients } => {
                                format!("sent to {} recipient(s)", recipients)
                            }
                            TenantOutcome::SkippedNoRecipients => "skipped, no recipients".into(),
                            TenantOutcome::Failed { reason } => format!("failed: {}", reason),
                        };
                        println!("{}: {} item(s), {}", tenant.tenant_id, tenant.items, outcome);
                    }
                    if report.tenants.is_empty() {
                        println!("Nothing to notify.");
                    }
                }
                Err(e) => eprintln!("Error running notifications: {}", e),
            }
        }
        None => {
            println!("Use 'exames --help' for commands");
        }
    }

    Ok(())
}
