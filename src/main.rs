use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use syncwatch::logging::init_tracing;
use syncwatch::transfer::CommandTransfer;
use syncwatch::utils::setup_signal_handlers;
use syncwatch::{ChangeQueue, Config, SyncError, SyncSession};

///////////////////////
// Utility functions //
///////////////////////

fn cli() -> Command {
	Command::new("syncwatch")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Push changed files under watched directories to a remote store")
		.subcommand_required(true)
		.subcommand(
			Command::new("run")
				.about("Read changed paths from stdin, one per line, and sync them")
				.arg(Arg::new("config").short('c').long("config").value_name("FILE"))
				.arg(
					Arg::new("root")
						.short('r')
						.long("root")
						.value_name("DIR")
						.action(ArgAction::Append)
						.help("Watch root (repeatable, replaces configured roots)"),
				)
				.arg(
					Arg::new("workers")
						.short('w')
						.long("workers")
						.value_name("N")
						.value_parser(value_parser!(usize)),
				)
				.arg(
					Arg::new("command")
						.long("command")
						.value_name("CMD")
						.help("Transfer command; {path}, {root} and {relative} are substituted"),
				)
				.arg(Arg::new("snapshot").short('s').long("snapshot").value_name("FILE"))
				.arg(Arg::new("exclude-file").long("exclude-file").value_name("FILE")),
		)
		.subcommand(
			Command::new("inspect")
				.about("List the pending paths stored in a queue snapshot")
				.arg(Arg::new("snapshot").required(true))
				.arg(
					Arg::new("limit")
						.short('n')
						.long("limit")
						.value_parser(value_parser!(usize))
						.default_value("50"),
				),
		)
}

fn load_config(matches: &ArgMatches) -> Result<Config, SyncError> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => Config::load(Path::new(path))?,
		None => Config::default(),
	};
	config.apply_env()?;

	if let Some(roots) = matches.get_many::<String>("root") {
		config.watch_roots = roots.map(PathBuf::from).collect();
	}
	if let Some(workers) = matches.get_one::<usize>("workers") {
		config.worker_count = *workers;
	}
	if let Some(command) = matches.get_one::<String>("command") {
		config.transfer_command = Some(command.clone());
	}
	if let Some(snapshot) = matches.get_one::<String>("snapshot") {
		config.snapshot_path = Some(PathBuf::from(snapshot));
	}
	if let Some(file) = matches.get_one::<String>("exclude-file") {
		config.exclude_file = Some(PathBuf::from(file));
	}
	Ok(config)
}

fn timer(secs: u64) -> Option<Interval> {
	if secs == 0 {
		return None;
	}
	Some(every(Duration::from_secs(secs)))
}

fn every(period: Duration) -> Interval {
	let mut timer = interval_at(Instant::now() + period, period);
	timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
	timer
}

async fn tick(timer: &mut Option<Interval>) {
	match timer {
		Some(timer) => {
			timer.tick().await;
		}
		None => std::future::pending().await,
	}
}

//////////
// Run //
//////////

async fn run(config: Config) -> Result<(), Box<dyn Error>> {
	let session = SyncSession::new(config)?;
	let command = session
		.config()
		.transfer_command
		.clone()
		.ok_or("run: a transfer command is required (--command or transferCommand)")?;
	let transfer = Arc::new(CommandTransfer::parse(&command)?);

	let restored = session.restore_snapshot()?;
	if restored > 0 {
		info!("Resuming {} queued change(s)", restored);
	}

	session.queue().spawn_notifier();
	let sync = session.orchestrator(transfer);
	sync.start();

	let shutdown = CancellationToken::new();
	setup_signal_handlers(shutdown.clone());

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut feed_open = true;
	let mut housekeeping = every(session.config().poll_interval());
	let mut status_timer = timer(session.config().status_interval_secs);
	let mut snapshot_timer = timer(session.config().snapshot_interval_secs);
	let mut saved_version = session.queue().version();

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			line = lines.next_line(), if feed_open => match line {
				Ok(Some(line)) => {
					let line = line.trim();
					if line.is_empty() {
						continue;
					}
					if let Err(e) = session.notify_changed(Path::new(line)) {
						warn!("Ignoring change: {}", e);
					}
				}
				Ok(None) => {
					info!("Change feed closed, finishing queued work");
					feed_open = false;
				}
				Err(e) => {
					error!("Failed to read change feed: {}", e);
					feed_open = false;
				}
			},
			_ = housekeeping.tick() => {
				if !sync.is_running() {
					error!("Dispatcher stopped, shutting down");
					break;
				}
				if !feed_open && session.queue().pending_plus_reserved_size() == 0 {
					debug!("Queue drained");
					break;
				}
			}
			_ = tick(&mut status_timer) => {
				info!("{}", session.report());
			}
			_ = tick(&mut snapshot_timer) => {
				let version = session.queue().version();
				if version != saved_version {
					match session.save_snapshot() {
						Ok(Some(saved)) => saved_version = saved,
						Ok(None) => {}
						Err(e) => error!("Periodic snapshot failed: {}", e),
					}
				}
			}
		}
	}

	sync.stop();
	shutdown.cancel();

	let termination = sync.await_termination(session.config().shutdown_timeout()).await;
	if let Ok(false) = termination {
		warn!("Shutting down with transfers still running; they stay in the snapshot");
	}

	if let Err(e) = session.save_snapshot() {
		error!("Failed to save queue snapshot: {}", e);
	}
	eprintln!("{}", session.report());

	termination?;
	Ok(())
}

fn inspect(snapshot: &Path, limit: usize) -> Result<(), Box<dyn Error>> {
	let queue = ChangeQueue::new();
	let no_roots: [PathBuf; 0] = [];
	let count = queue.restore(snapshot, &no_roots)?;

	println!("{} queued path(s)", count);
	for path in queue.peek(limit) {
		println!("{}", path.display());
	}
	if count > limit {
		println!("... and {} more", count - limit);
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = cli().get_matches();

	if let Some(sub_matches) = matches.subcommand_matches("run") {
		let config = load_config(sub_matches)?;
		init_tracing(&config.log_level);
		run(config).await?;
	} else if let Some(sub_matches) = matches.subcommand_matches("inspect") {
		init_tracing("warn");
		let snapshot =
			sub_matches.get_one::<String>("snapshot").ok_or("inspect: snapshot argument required")?;
		let limit = sub_matches.get_one::<usize>("limit").copied().unwrap_or(50);
		inspect(Path::new(snapshot), limit)?;
	}

	Ok(())
}

// vim: ts=4
