//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::basket_simulator::BasketSimulator;
use crate::adapters::csv_adapter::{CsvPriceAdapter, CsvUniverseAdapter, DEFAULT_SYMBOL_COLUMN};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::script_file_adapter::ScriptReplayAdapter;
use crate::domain::auto_backtest::{load_universe, AutoBacktest};
use crate::domain::classifier::{ErrorClassifier, DEFAULT_BENCHMARK_SYMBOL};
use crate::domain::config_validation::validate_config;
use crate::domain::controller::{AttemptOutcome, BacktestOutcome, OutcomeSource};
use crate::domain::error::{AppError, ScriptError};
use crate::domain::executor::{Capabilities, SandboxedExecutor};
use crate::domain::prompt::PromptBuilder;
use crate::domain::request::{
    Interval, Period, StrategyRequest, DEFAULT_INITIAL_CASH, DEFAULT_MAX_ATTEMPTS, DEFAULT_SIZE,
};
use crate::domain::sanitizer::sanitize;
use crate::domain::simulation::{PortfolioResult, SimulationConfig};
use crate::domain::universe::{parse_symbols, DEFAULT_EXCHANGE_SUFFIX};
use crate::domain::validator::validate;
use crate::ports::codegen_port::CodeGenPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::simulation_port::SimulationPort;

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "strategen.ini";
pub const DEFAULT_UNIVERSE_CSV: &str = "ind_nifty500list.csv";
const DATA_TIMEOUT: Duration = Duration::from_secs(30);
const KNOWN_SECTIONS: [&str; 3] = ["backtest", "data", "llm"];

#[derive(Parser, Debug)]
#[command(name = "strategen", about = "Natural-language strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate, repair and backtest a strategy described in plain language
    Backtest {
        prompt: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Replay these scripts, in order, instead of calling the model
        #[arg(long = "script")]
        scripts: Vec<PathBuf>,
        /// Comma-separated tickers; defaults to the universe CSV
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long)]
        cash: Option<f64>,
        #[arg(long)]
        size: Option<f64>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        interval: Option<String>,
        #[arg(long)]
        max_attempts: Option<u32>,
        /// List every trade after the summary
        #[arg(long)]
        trades: bool,
    },
    /// Run one signal script and report what it binds
    Exec {
        script: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        interval: Option<String>,
    },
    /// Print the prompt sent to the model
    Prompt {
        prompt: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the normalized ticker universe
    Universe {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Ticker list to read instead of the configured one
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Yahoo,
    Csv,
}

/// `[llm]` values. Unset fields take the client's defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LlmSettings {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub source: DataSource,
    pub csv_dir: Option<PathBuf>,
    pub universe_csv: PathBuf,
    pub symbol_column: String,
    pub exchange_suffix: String,
    pub benchmark_symbol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestDefaults {
    pub initial_cash: f64,
    pub size: f64,
    pub period: Period,
    pub interval: Interval,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub llm: LlmSettings,
    pub data: DataSettings,
    pub backtest: BacktestDefaults,
}

/// Per-run overrides from command-line flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub cash: Option<f64>,
    pub size: Option<f64>,
    pub period: Option<String>,
    pub interval: Option<String>,
    pub max_attempts: Option<u32>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            prompt,
            config,
            scripts,
            tickers,
            cash,
            size,
            period,
            interval,
            max_attempts,
            trades,
        } => {
            let overrides = RequestOverrides {
                cash,
                size,
                period,
                interval,
                max_attempts,
            };
            run_backtest(
                &prompt,
                config.as_deref(),
                &scripts,
                tickers.as_deref(),
                &overrides,
                trades,
            )
        }
        Command::Exec {
            script,
            config,
            tickers,
            period,
            interval,
        } => run_exec(
            &script,
            config.as_deref(),
            tickers.as_deref(),
            period.as_deref(),
            interval.as_deref(),
        ),
        Command::Prompt { prompt, config } => run_prompt(&prompt, config.as_deref()),
        Command::Universe { config, csv } => run_universe(config.as_deref(), csv.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: AppError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Load `path`, or [`DEFAULT_CONFIG_FILE`] when present, or an empty config.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, AppError> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            FileConfigAdapter::from_file(p)
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            eprintln!("Loading config from {DEFAULT_CONFIG_FILE}");
            FileConfigAdapter::from_file(DEFAULT_CONFIG_FILE)
        }
        None => FileConfigAdapter::from_string("").map_err(|reason| AppError::ConfigParse {
            file: "<defaults>".into(),
            reason,
        }),
    }
}

/// Validate the config and read every setting, applying defaults.
pub fn build_settings(config: &dyn ConfigPort) -> Result<Settings, AppError> {
    validate_config(config)?;

    let non_blank = |section: &str, key: &str| {
        config
            .get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let timeout = non_blank("llm", "timeout_secs")
        .map(|_| Duration::from_secs(config.get_int("llm", "timeout_secs", 0) as u64));
    let llm = LlmSettings {
        endpoint: non_blank("llm", "endpoint"),
        model: non_blank("llm", "model"),
        api_key_env: non_blank("llm", "api_key_env"),
        timeout,
    };

    let source = match non_blank("data", "source").as_deref() {
        Some("csv") => DataSource::Csv,
        _ => DataSource::Yahoo,
    };
    let data = DataSettings {
        source,
        csv_dir: non_blank("data", "csv_dir").map(PathBuf::from),
        universe_csv: PathBuf::from(
            non_blank("data", "universe_csv").unwrap_or_else(|| DEFAULT_UNIVERSE_CSV.into()),
        ),
        symbol_column: non_blank("data", "symbol_column")
            .unwrap_or_else(|| DEFAULT_SYMBOL_COLUMN.into()),
        exchange_suffix: config
            .get_string("data", "exchange_suffix")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_EXCHANGE_SUFFIX.into()),
        benchmark_symbol: non_blank("data", "benchmark_symbol")
            .unwrap_or_else(|| DEFAULT_BENCHMARK_SYMBOL.into()),
    };

    let backtest = BacktestDefaults {
        initial_cash: config.get_double("backtest", "initial_cash", DEFAULT_INITIAL_CASH),
        size: config.get_double("backtest", "size", DEFAULT_SIZE),
        period: match non_blank("backtest", "period") {
            Some(p) => p.parse()?,
            None => Period::default(),
        },
        interval: match non_blank("backtest", "interval") {
            Some(i) => i.parse()?,
            None => Interval::default(),
        },
        max_attempts: config.get_int("backtest", "max_attempts", i64::from(DEFAULT_MAX_ATTEMPTS))
            as u32,
    };

    Ok(Settings { llm, data, backtest })
}

/// Tickers from `--tickers` when given, otherwise the universe CSV.
pub fn resolve_tickers(
    tickers_override: Option<&str>,
    data: &DataSettings,
) -> Result<Vec<String>, AppError> {
    if let Some(list) = tickers_override {
        return Ok(parse_symbols(list, &data.exchange_suffix)?);
    }
    let port = CsvUniverseAdapter::new(data.universe_csv.clone()).with_column(&data.symbol_column);
    Ok(load_universe(&port, &data.exchange_suffix)?.symbols)
}

pub fn build_request(
    prompt: &str,
    tickers: Vec<String>,
    defaults: &BacktestDefaults,
    overrides: &RequestOverrides,
) -> Result<StrategyRequest, AppError> {
    let period = match &overrides.period {
        Some(p) => p.parse()?,
        None => defaults.period,
    };
    let interval = match &overrides.interval {
        Some(i) => i.parse()?,
        None => defaults.interval,
    };
    let request = StrategyRequest::new(prompt, tickers)
        .with_initial_cash(overrides.cash.unwrap_or(defaults.initial_cash))
        .with_size(overrides.size.unwrap_or(defaults.size))
        .with_period(period)
        .with_interval(interval)
        .with_max_attempts(overrides.max_attempts.unwrap_or(defaults.max_attempts));
    request.validate()?;
    Ok(request)
}

pub fn market_port(data: &DataSettings) -> Result<Box<dyn MarketDataPort>, AppError> {
    match data.source {
        DataSource::Csv => {
            let dir = data.csv_dir.clone().ok_or_else(|| AppError::ConfigMissing {
                section: "data".into(),
                key: "csv_dir".into(),
            })?;
            Ok(Box::new(CsvPriceAdapter::new(dir)))
        }
        #[cfg(feature = "http")]
        DataSource::Yahoo => {
            let adapter = crate::adapters::yahoo_adapter::YahooAdapter::new(Some(DATA_TIMEOUT))?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "http"))]
        DataSource::Yahoo => {
            let _ = DATA_TIMEOUT;
            Err(AppError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: "the yahoo source requires the http feature".into(),
            })
        }
    }
}

/// Replay `scripts` when any are given, otherwise the configured model.
pub fn codegen_port(
    scripts: &[PathBuf],
    llm: &LlmSettings,
) -> Result<Box<dyn CodeGenPort>, AppError> {
    if !scripts.is_empty() {
        eprintln!("Replaying {} local script(s)", scripts.len());
        return Ok(Box::new(ScriptReplayAdapter::from_files(scripts)?));
    }

    #[cfg(feature = "http")]
    {
        use crate::adapters::openai_adapter::{OpenAiAdapter, OpenAiSettings};

        let defaults = OpenAiSettings::default();
        let settings = OpenAiSettings {
            endpoint: llm.endpoint.clone().unwrap_or(defaults.endpoint),
            model: llm.model.clone().unwrap_or(defaults.model),
            api_key_env: llm.api_key_env.clone().unwrap_or(defaults.api_key_env),
            timeout: llm.timeout,
        };
        let adapter = OpenAiAdapter::from_env(settings)?;
        eprintln!("Using model {}", adapter.model());
        Ok(Box::new(adapter))
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = llm;
        Err(AppError::ConfigInvalid {
            section: "llm".into(),
            key: "endpoint".into(),
            reason: "model access requires the http feature; use --script".into(),
        })
    }
}

fn run_backtest(
    prompt: &str,
    config_path: Option<&Path>,
    scripts: &[PathBuf],
    tickers_override: Option<&str>,
    overrides: &RequestOverrides,
    show_trades: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    let settings = match load_config(config_path).and_then(|c| build_settings(&c)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 2: Resolve tickers and build the request
    let request = match resolve_tickers(tickers_override, &settings.data)
        .and_then(|tickers| build_request(prompt, tickers, &settings.backtest, overrides))
    {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    eprintln!(
        "Backtesting {} tickers over {} at {} (max {} attempts)",
        request.tickers.len(),
        request.period,
        request.interval,
        request.max_attempts
    );

    // Stage 3: Wire ports
    let market = match market_port(&settings.data) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };
    let codegen = match codegen_port(scripts, &settings.llm) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let simulator = BasketSimulator::new();

    // Stage 4: Generate, repair, simulate
    let outcome = AutoBacktest::new(market.as_ref(), codegen.as_ref(), &simulator)
        .with_benchmark_symbol(settings.data.benchmark_symbol.clone())
        .run(&request);
    match outcome {
        Ok(outcome) => {
            print_outcome(&outcome, show_trades);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_outcome(outcome: &BacktestOutcome, show_trades: bool) {
    eprintln!("\n=== Attempts ===");
    for record in &outcome.attempts {
        match &record.outcome {
            AttemptOutcome::Succeeded => eprintln!("  #{}: ok", record.attempt),
            AttemptOutcome::Failed(err) => {
                eprintln!("  #{}: {} ({})", record.attempt, err.category, err.message)
            }
        }
    }
    match outcome.source {
        OutcomeSource::Generated { attempt } => {
            eprintln!("Signals from generated code (attempt {attempt})")
        }
        OutcomeSource::Fallback => eprintln!("Signals from fallback strategy"),
    }

    eprintln!("\n=== Strategy Code ===");
    println!("{}", outcome.code);

    print_portfolio(&outcome.portfolio);
    if show_trades {
        print_trades(&outcome.portfolio);
    }
}

fn print_portfolio(portfolio: &PortfolioResult) {
    let m = &portfolio.metrics;
    eprintln!("\n=== Results ===");
    eprintln!("Start Value:      {:.2}", portfolio.start_value);
    eprintln!("End Value:        {:.2}", portfolio.end_value);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annual Return:    {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.2}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", portfolio.trade_count());
    eprintln!("Win Rate:         {:.2}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
}

fn print_trades(portfolio: &PortfolioResult) {
    eprintln!("\n=== Trades ===");
    for t in &portfolio.trades {
        eprintln!(
            "  {:<14} {} @ {:>10.2} -> {} @ {:>10.2}  qty {:>10.4}  pnl {:>10.2}  {:?}",
            t.symbol,
            t.entry_date,
            t.entry_price,
            t.exit_date,
            t.exit_price,
            t.quantity,
            t.pnl,
            t.status
        );
    }
}

fn run_exec(
    script_path: &Path,
    config_path: Option<&Path>,
    tickers_override: Option<&str>,
    period: Option<&str>,
    interval: Option<&str>,
) -> ExitCode {
    let settings = match load_config(config_path).and_then(|c| build_settings(&c)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let code = match fs::read_to_string(script_path) {
        Ok(text) => sanitize(&text),
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", script_path.display());
            return ExitCode::from(1);
        }
    };

    let overrides = RequestOverrides {
        period: period.map(str::to_string),
        interval: interval.map(str::to_string),
        ..RequestOverrides::default()
    };
    let request = match resolve_tickers(tickers_override, &settings.data).and_then(|tickers| {
        build_request("exec", tickers, &settings.backtest, &overrides)
    }) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let market = match market_port(&settings.data) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };
    let raw = match market.download(&request.tickers, request.period, request.interval) {
        Ok(p) => p,
        Err(e) => return fail(e.into()),
    };
    let (rows, cols) = raw.shape();
    eprintln!("Price panel: {rows} rows x {cols} symbols");

    let simulator = BasketSimulator::new();
    let sim_config = SimulationConfig::new(request.initial_cash, request.size);
    let caps = Capabilities::tables()
        .with_market(market.as_ref(), request.period, request.interval)
        .with_sim(&simulator, sim_config.clone());
    let classifier = ErrorClassifier::new(settings.data.benchmark_symbol.clone());

    let bindings = match SandboxedExecutor::new(&caps).execute(1, &code, &raw) {
        Ok(b) => b,
        Err(fault) => {
            if let ScriptError::Syntax(e) = &fault.error {
                eprintln!("{}", e.display_with_context(&code));
            }
            let classified = classifier.classify(&fault.message());
            eprintln!("error: {classified}");
            return (&AppError::from(fault.error)).into();
        }
    };

    eprintln!("\n=== Bindings ===");
    for (name, value) in bindings.iter().filter(|(n, _)| n.as_str() != "raw") {
        println!("{name:<16} {}", value.describe());
    }

    let triple = match validate(&bindings) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {}", classifier.classify(&e.to_string()));
            return (&AppError::from(e)).into();
        }
    };
    let (rows, cols) = triple.shape();
    eprintln!(
        "\nSignals: ({rows}, {cols}), {} entries, {} exits",
        triple.entries.count_true(),
        triple.exits.count_true()
    );
    match simulator.from_signals(&triple, &sim_config) {
        Ok(portfolio) => {
            print_portfolio(&portfolio);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e.into()),
    }
}

fn run_prompt(prompt: &str, config_path: Option<&Path>) -> ExitCode {
    let settings = match load_config(config_path).and_then(|c| build_settings(&c)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let builder = PromptBuilder::new(settings.data.benchmark_symbol)
        .with_data_window(settings.backtest.period, settings.backtest.interval);
    println!("{}", builder.build(prompt, None));
    ExitCode::SUCCESS
}

fn run_universe(config_path: Option<&Path>, csv_override: Option<&Path>) -> ExitCode {
    let mut settings = match load_config(config_path).and_then(|c| build_settings(&c)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if let Some(csv) = csv_override {
        settings.data.universe_csv = csv.to_path_buf();
    }
    match resolve_tickers(None, &settings.data) {
        Ok(tickers) => {
            for t in &tickers {
                println!("{t}");
            }
            eprintln!("{} tickers from {}", tickers.len(), settings.data.universe_csv.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_config(Some(config_path)) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    for section in config.sections() {
        if !KNOWN_SECTIONS.contains(&section.as_str()) {
            eprintln!("warning: unknown section [{section}]");
        }
    }
    match build_settings(&config) {
        Ok(settings) => {
            eprintln!("Config validated successfully");
            eprintln!("  data source:  {:?}", settings.data.source);
            eprintln!("  benchmark:    {}", settings.data.benchmark_symbol);
            eprintln!(
                "  window:       {} at {}",
                settings.backtest.period, settings.backtest.interval
            );
            eprintln!("  max attempts: {}", settings.backtest.max_attempts);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
