use crossterm::{
    cursor::{Hide, Show},
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode,
    },
    execute,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::env;
use std::io::{BufWriter, stdout};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

mod config;
mod countdown;
mod driver;
mod render;
mod sched;
mod sim;
mod theme;

use config::{Config, Profile};
use countdown::Countdown;
use driver::Driver;
use sched::{Clock, SystemClock};

fn print_usage() {
    eprintln!("pyroterm - New Year fireworks show for the terminal");
    eprintln!();
    eprintln!("Usage: pyroterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --theme NAME       Starting theme: anime, cyberpunk, festival, nature");
    eprintln!("  --profile MODE     Power profile: full (default) or low");
    eprintln!("  --seed N           Seed the show for a reproducible run");
    eprintln!("  --until YYYY-MM-DD Count down to this date (default: next New Year)");
    eprintln!("  --no-countdown     Hide the countdown overlay");
    eprintln!("  --fps N            Target frame rate (default 60)");
    eprintln!();
    eprintln!("Controls: click = launch, drag = volley, space = launch,");
    eprintln!("          t = cycle theme, q/ESC/Ctrl+C = quit");
}

struct Args {
    theme_idx: usize,
    profile: Profile,
    seed: u64,
    countdown: Option<Countdown>,
    fps: u64,
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();

    let mut theme_idx = 0;
    let mut profile = Profile::Full;
    let mut seed = fastrand::u64(..);
    let mut until: Option<i64> = None;
    let mut show_countdown = true;
    let mut fps = 60u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--theme" => {
                let Some(idx) = args.get(i + 1).and_then(|v| theme::by_name(v)) else {
                    eprintln!("Unknown theme, expected one of: anime, cyberpunk, festival, nature");
                    std::process::exit(1);
                };
                theme_idx = idx;
                i += 2;
            }
            "--profile" => {
                let Some(p) = args.get(i + 1).and_then(|v| Profile::parse(v)) else {
                    eprintln!("Invalid profile, expected: full or low");
                    std::process::exit(1);
                };
                profile = p;
                i += 2;
            }
            "--seed" => {
                let Some(n) = args.get(i + 1).and_then(|v| v.parse().ok()) else {
                    eprintln!("--seed requires a number");
                    std::process::exit(1);
                };
                seed = n;
                i += 2;
            }
            "--until" => {
                let Some(secs) = args.get(i + 1).and_then(|v| Countdown::parse_date(v)) else {
                    eprintln!("--until requires a date as YYYY-MM-DD");
                    std::process::exit(1);
                };
                until = Some(secs);
                i += 2;
            }
            "--no-countdown" => {
                show_countdown = false;
                i += 1;
            }
            "--fps" => {
                let Some(n) = args.get(i + 1).and_then(|v| v.parse().ok()) else {
                    eprintln!("--fps requires a number");
                    std::process::exit(1);
                };
                fps = n;
                i += 2;
            }
            "help" | "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            arg => {
                eprintln!("Unknown option: {arg}");
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    let countdown = show_countdown.then(|| match until {
        Some(secs) => Countdown::with_target(secs),
        None => Countdown::to_next_new_year(epoch_secs()),
    });

    Args {
        theme_idx,
        profile,
        seed,
        countdown,
        fps: fps.clamp(1, 240),
    }
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn run(args: Args) -> std::io::Result<()> {
    let stdout = stdout();
    let mut stdout = BufWriter::with_capacity(1024 * 64, stdout);

    terminal::enable_raw_mode()?;
    execute!(
        stdout,
        EnterAlternateScreen,
        Hide,
        Clear(ClearType::All),
        EnableMouseCapture,
        EnableFocusChange
    )?;

    let (cols, rows) = terminal::size()?;
    let clock = SystemClock::new();
    let cfg = Config::for_profile(args.profile);
    let mut driver = Driver::new(cols, rows, cfg, args.theme_idx, args.seed, args.countdown);
    driver.start(clock.now_ms());

    let frame_interval = Duration::from_millis(1000 / args.fps);
    let mut next_frame = Instant::now();

    'show: loop {
        // Sample input until the next frame is due.
        loop {
            let timeout = next_frame.saturating_duration_since(Instant::now());
            if !event::poll(timeout)? {
                break;
            }
            let ev = event::read()?;
            if let Event::Key(key) = &ev {
                if key.code == KeyCode::Char('q')
                    || key.code == KeyCode::Esc
                    || (key.code == KeyCode::Char('c')
                        && key.modifiers.contains(event::KeyModifiers::CONTROL))
                {
                    break 'show;
                }
            }
            driver.handle_event(&ev, clock.now_ms());
        }

        driver.frame(clock.now_ms(), epoch_secs(), &mut stdout)?;

        next_frame += frame_interval;
        let now = Instant::now();
        if next_frame < now {
            // Fell behind (stall, suspend); restart the cadence.
            next_frame = now;
        }
    }

    execute!(
        stdout,
        Show,
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal::disable_raw_mode()?;

    Ok(())
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    run(parse_args())
}
