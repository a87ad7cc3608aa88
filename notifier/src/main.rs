use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use od_notifier::campaign::{parse_run_date, Campaign, CampaignRunner, RunMode, RunOptions};
use od_notifier::commands;
use od_notifier::configuration::get_configuration;
use od_notifier::startup::ProductionServiceFactory;
use telemetry::{get_subscriber, init_subscriber};

#[derive(Parser, Debug)]
#[command(name = "od-notifier", version, about = "Daily OD notification emails")]
struct Cli {
    /// Render every email and log it instead of sending
    #[arg(long = "test", global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a campaign (the default)
    Run {
        #[arg(long, value_enum, default_value = "od")]
        campaign: Campaign,
        /// Use this date (YYYY-MM-DD) instead of today
        #[arg(long, value_parser = parse_run_date)]
        date: Option<NaiveDate>,
    },
    /// Validate the CSV files without sending anything
    Validate,
    /// Print configuration, data and provider diagnostics
    Diagnose,
    /// Check the Brevo API key and account
    CheckProvider,
    /// Send a single test email
    TestEmail {
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let subscriber = get_subscriber("od-notifier".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let settings = match get_configuration() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to read configuration");
            std::process::exit(1);
        }
    };
    let factory = ProductionServiceFactory;
    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Live
    };

    let code = match cli.command.unwrap_or(Command::Run {
        campaign: Campaign::OdNotifications,
        date: None,
    }) {
        Command::Run { campaign, date } => {
            let options = RunOptions {
                campaign,
                mode,
                today: date,
            };
            CampaignRunner::new(&settings, &factory, options)
                .run()
                .await
                .exit_code()
        }
        Command::Validate => commands::validate(&settings),
        Command::Diagnose => commands::diagnose(&settings, &factory).await,
        Command::CheckProvider => commands::check_provider(&settings, &factory).await,
        Command::TestEmail { to } => commands::test_email(&settings, &factory, to, cli.dry_run).await,
    };

    std::process::exit(code)
}
