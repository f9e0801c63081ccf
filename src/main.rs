use std::collections::HashSet;
use std::error::Error;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use blocktime::config::{load_config, resolve_data_dir};
use blocktime::domain::{Category, DayPeriod, Granularity, format_minutes};
use blocktime::logging;
use blocktime::stats::{PeriodSummary, StatsPeriod, start_of_week};
use blocktime::storage::FileStore;
use blocktime::tracker::Tracker;

#[derive(Debug, Parser)]
#[command(name = "blocktime", about = "Daily time ledger split into fixed-size slots")]
struct Cli {
	#[arg(long, global = true)]
	data_dir: Option<PathBuf>,
	/// Day to work on (YYYY-MM-DD), defaults to today
	#[arg(long, global = true)]
	date: Option<String>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Day,
	Assign {
		/// Start time of a slot (HH:MM), repeatable
		#[arg(long = "at", required = true)]
		times: Vec<String>,
		#[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
		category: Option<String>,
		#[arg(long)]
		clear: bool,
	},
	ResetDay,
	Granularity {
		#[arg(value_parser = parse_granularity)]
		minutes: Option<Granularity>,
	},
	Stats {
		#[arg(long, default_value_t = StatsPeriod::Day)]
		period: StatsPeriod,
	},
	Categories,
	AddCategory {
		#[arg(long)]
		name: String,
		#[arg(long, default_value = "•")]
		glyph: String,
		#[arg(long, default_value = "#8E8E93")]
		color: String,
	},
	UpdateCategory {
		#[arg(long)]
		id: String,
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		glyph: Option<String>,
		#[arg(long)]
		color: Option<String>,
	},
	DeleteCategory {
		#[arg(long)]
		id: String,
	},
	ResetCategories,
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	let data_dir = resolve_data_dir(cli.data_dir);
	let config = load_config(&data_dir)?;
	logging::init(config.log_level.as_deref());

	let mut tracker = Tracker::open(FileStore::new(&data_dir), config.default_granularity)?;
	if let Some(raw) = cli.date.as_deref() {
		tracker.select_date(parse_day(raw)?)?;
	}

	match cli.command.unwrap_or(Command::Day) {
		Command::Day => {
			print_day(&mut tracker)?;
		}
		Command::Assign {
			times,
			category,
			clear,
		} => {
			let category = if clear { None } else { category };
			if let Some(id) = category.as_deref() {
				if tracker.category(id).is_none() {
					return Err(format!("category not found: {id}").into());
				}
			}

			let ledger = tracker.current_ledger()?;
			let mut slot_ids = HashSet::new();
			for raw in &times {
				let (hour, minute) = parse_time(raw)?;
				let slot = ledger
					.slot_at(hour, minute)
					.ok_or_else(|| format!("no slot at {raw}"))?;
				slot_ids.insert(slot.id.clone());
			}

			let updated = tracker.assign_category_batch(&slot_ids, category.as_deref())?;
			println!("updated {updated} slot(s) on {}", tracker.selected_date());
		}
		Command::ResetDay => {
			tracker.reset_current_day()?;
			println!("reset {}", tracker.selected_date());
		}
		Command::Granularity { minutes } => match minutes {
			Some(granularity) => {
				tracker.change_granularity(granularity)?;
				println!(
					"granularity set to {granularity}; {} regenerated",
					tracker.selected_date()
				);
			}
			None => println!("{}", tracker.granularity()),
		},
		Command::Stats { period } => {
			print_stats(&tracker, &tracker.stats_for(period));
		}
		Command::Categories => {
			print_categories(tracker.categories());
		}
		Command::AddCategory { name, glyph, color } => {
			let category = Category::new(name, glyph, color);
			let id = category.id.clone();
			tracker.add_category(category)?;
			println!("created category {id}");
		}
		Command::UpdateCategory {
			id,
			name,
			glyph,
			color,
		} => {
			let mut category = tracker
				.category(&id)
				.cloned()
				.ok_or_else(|| format!("category not found: {id}"))?;
			if let Some(name) = name {
				category.name = name;
			}
			if let Some(glyph) = glyph {
				category.glyph = glyph;
			}
			if let Some(color) = color {
				category.color = color;
			}
			tracker.update_category(category)?;
			println!("updated category {id}");
		}
		Command::DeleteCategory { id } => {
			let built_in = tracker
				.category(&id)
				.map(|category| category.is_built_in)
				.unwrap_or(false);
			tracker.delete_category(&id)?;
			if built_in {
				println!("{id} is built in and was kept");
			} else {
				println!("deleted category {id}");
			}
		}
		Command::ResetCategories => {
			tracker.reset_categories_to_default()?;
			println!("restored {} default categories", tracker.categories().len());
		}
	}

	Ok(())
}

fn parse_granularity(raw: &str) -> Result<Granularity, String> {
	let minutes: u32 = raw
		.parse()
		.map_err(|_| format!("not a number of minutes: {raw}"))?;
	Granularity::try_from(minutes).map_err(|err| err.to_string())
}

fn parse_day(raw: &str) -> Result<NaiveDate, Box<dyn Error>> {
	Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
}

fn parse_time(raw: &str) -> Result<(u32, u32), Box<dyn Error>> {
	let (hour, minute) = raw
		.split_once(':')
		.ok_or_else(|| format!("expected HH:MM, got {raw}"))?;
	let hour: u32 = hour.trim().parse()?;
	let minute: u32 = minute.trim().parse()?;
	if hour > 23 || minute > 59 {
		return Err(format!("time out of range: {raw}").into());
	}
	Ok((hour, minute))
}

fn print_day(tracker: &mut Tracker<FileStore>) -> Result<(), Box<dyn Error>> {
	let ledger = tracker.current_ledger()?.clone();
	let today_marker = if tracker.is_viewing_today() { " (today)" } else { "" };
	println!(
		"{}{} | {} slots of {}",
		ledger.date().format("%A %Y-%m-%d"),
		today_marker,
		ledger.len(),
		tracker.granularity()
	);

	for period in DayPeriod::ALL {
		println!("\n{}:", period.label());
		for slot in ledger.slots_in_period(period) {
			let label = slot
				.category_id
				.as_deref()
				.and_then(|id| tracker.category(id))
				.map(|category| format!("{} {}", category.glyph, category.name))
				.unwrap_or_else(|| "-".to_string());
			println!("{} | {} | {}", slot.display_range(), slot.id, label);
		}
	}

	Ok(())
}

fn print_stats(tracker: &Tracker<FileStore>, summary: &PeriodSummary) {
	let window = match summary.period {
		StatsPeriod::Day => summary.anchor.format("%Y-%m-%d").to_string(),
		StatsPeriod::Week => format!(
			"week of {}",
			start_of_week(summary.anchor)
				.unwrap_or(summary.anchor)
				.format("%Y-%m-%d")
		),
		StatsPeriod::Month => summary.anchor.format("%B %Y").to_string(),
	};
	println!("stats for {window}");

	let rows = summary.ranked();
	if rows.is_empty() {
		println!("no assigned slots in this {}", summary.period);
	}

	for (category_id, count) in &rows {
		let label = tracker
			.category(category_id)
			.map(|category| format!("{} {}", category.glyph, category.name))
			.unwrap_or_else(|| category_id.clone());
		println!(
			"{} | {:>5.1}% | {}",
			format_minutes(summary.minutes_for(*count)),
			summary.share(*count),
			label
		);
	}

	println!(
		"\nassigned: {} ({:.0}%)",
		format_minutes(summary.minutes_for(summary.total_assigned())),
		summary.assigned_percentage()
	);
	println!(
		"unassigned: {}",
		format_minutes(summary.minutes_for(summary.unassigned()))
	);
}

fn print_categories(categories: &[Category]) {
	if categories.is_empty() {
		println!("no categories yet");
		return;
	}

	for category in categories {
		let kind = if category.is_built_in { "built-in" } else { "custom" };
		println!(
			"{} | {} {} | {} | {}",
			category.id, category.glyph, category.name, category.color, kind
		);
	}
}
