use std::{collections::HashMap, str::FromStr};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::{
    auth::check_credentials,
    error::AppError,
    models::rates::Rates,
    services::taximeter::{Action, ActionOutcome, TaximeterService},
};

const HELP: &str = "Commands: start, stop, move, finish, status, trips, help, exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Meter(Action),
    Status,
    Trips,
    Help,
    Exit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(Command::Status),
            "trips" => Ok(Command::Trips),
            "help" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            other => other.parse().map(Command::Meter),
        }
    }
}

/// Interactive command loop over any line-oriented input, gated by a login
/// against `users`. Returns on `exit`, EOF or a failed login.
pub async fn run<R, W>(
    service: &TaximeterService,
    users: &HashMap<String, String>,
    input: R,
    mut output: W,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    if !login(users, &mut lines, &mut output).await? {
        return Ok(());
    }
    say(&mut output, "Welcome to the taximeter!").await?;
    say(&mut output, HELP).await?;

    loop {
        prompt(&mut output, "> ").await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(_) => {
                warn!(command = %line.trim(), "unknown command");
                say(&mut output, &format!("Unknown command. {HELP}")).await?;
                continue;
            }
        };

        match command {
            Command::Exit => break,
            Command::Help => say(&mut output, HELP).await?,
            Command::Status => status(service, &mut output).await?,
            Command::Trips => trips(service, &mut output).await?,
            Command::Meter(Action::Start) => {
                if service.query_state().await.is_some() {
                    say(&mut output, "Error: a trip is already in progress.").await?;
                    continue;
                }
                let Some(rates) = ask_rates(service.default_rates(), &mut lines, &mut output).await?
                else {
                    break;
                };
                meter(service, Action::Start, Some(rates), &mut output).await?;
            }
            Command::Meter(action) => meter(service, action, None, &mut output).await?,
        }
    }

    info!("command loop finished");
    say(&mut output, "Goodbye!").await?;
    Ok(())
}

async fn login<R, W>(
    users: &HashMap<String, String>,
    lines: &mut tokio::io::Lines<R>,
    output: &mut W,
) -> Result<bool, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    say(output, "Authentication required").await?;
    prompt(output, "Username: ").await?;
    let Some(username) = lines.next_line().await? else {
        return Ok(false);
    };
    prompt(output, "Password: ").await?;
    let Some(password) = lines.next_line().await? else {
        return Ok(false);
    };

    match check_credentials(users, &username, &password) {
        Ok(user) => {
            info!(username = %user.username, "cli login");
            Ok(true)
        }
        Err(_) => {
            warn!(username = %username.trim(), "cli login rejected");
            say(output, "Access denied. Incorrect username or password.").await?;
            Ok(false)
        }
    }
}

async fn ask_rates<R, W>(
    defaults: Rates,
    lines: &mut tokio::io::Lines<R>,
    output: &mut W,
) -> Result<Option<Rates>, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    prompt(output, "Price per second stopped (€): ").await?;
    let Some(stopped) = lines.next_line().await? else {
        return Ok(None);
    };
    prompt(output, "Price per second moving (€): ").await?;
    let Some(moving) = lines.next_line().await? else {
        return Ok(None);
    };

    match Rates::parse_checked(&stopped, &moving, defaults) {
        Ok(rates) => Ok(Some(rates)),
        Err(defaults) => {
            say(
                output,
                &format!(
                    "Invalid input. Using default prices ({}/{}).",
                    defaults.stopped, defaults.moving
                ),
            )
            .await?;
            Ok(Some(defaults))
        }
    }
}

async fn meter<W>(
    service: &TaximeterService,
    action: Action,
    rates: Option<Rates>,
    output: &mut W,
) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    match service.apply(action, rates).await {
        Ok(ActionOutcome::Started(snapshot)) => {
            say(
                output,
                &format!("Trip started. Initial state: '{}'.", snapshot.state),
            )
            .await
        }
        Ok(ActionOutcome::StateChanged(change)) => {
            say(output, &format!("State changed to '{}'.", change.to)).await
        }
        Ok(ActionOutcome::Finished(trip)) => {
            let summary = format!(
                "\n--- Trip summary ---\nStopped time: {:.1} seconds\nMoving time: {:.1} seconds\nTotal fare: €{:.2}\n--------------------",
                trip.session.stopped_seconds,
                trip.session.moving_seconds,
                trip.total_fare()
            );
            say(output, &summary).await?;
            if let Some(err) = trip.storage_warning() {
                say(output, &format!("Warning: the trip could not be saved ({err}).")).await?;
            }
            Ok(())
        }
        Err(err @ (AppError::AlreadyActive | AppError::NoActiveTrip)) => {
            say(output, &format!("Error: {err}.")).await
        }
        Err(err) => Err(err),
    }
}

async fn status<W>(service: &TaximeterService, output: &mut W) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    match service.snapshot().await {
        Some(snapshot) => {
            say(
                output,
                &format!(
                    "State: {} | stopped {:.1}s | moving {:.1}s | fare so far €{:.2}",
                    snapshot.state,
                    snapshot.stopped_seconds,
                    snapshot.moving_seconds,
                    snapshot.fare
                ),
            )
            .await
        }
        None => say(output, "No trip in progress.").await,
    }
}

async fn trips<W>(service: &TaximeterService, output: &mut W) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    let trips = match service.list_trips().await {
        Ok(trips) => trips,
        Err(err @ AppError::Storage(_)) => {
            return say(output, &format!("Error: could not read trips ({err}).")).await;
        }
        Err(err) => return Err(err),
    };
    if trips.is_empty() {
        return say(output, "No trips recorded yet.").await;
    }
    for trip in trips {
        say(
            output,
            &format!(
                "#{} {} | stopped {:.1}s | moving {:.1}s | €{:.2}",
                trip.id, trip.started_at, trip.stopped_seconds, trip.moving_seconds, trip.total_fare
            ),
        )
        .await?;
    }
    Ok(())
}

async fn say<W>(output: &mut W, message: &str) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(message.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

async fn prompt<W>(output: &mut W, text: &str) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        services::storage::TripRepository,
        test_support::{fixed_clock, MemoryRepository},
    };

    const LOGIN: &str = "admin\n1234\n";

    async fn transcript(script: &str) -> (String, Arc<MemoryRepository>) {
        let users = HashMap::from([("admin".to_string(), "1234".to_string())]);
        let repo = Arc::new(MemoryRepository::default());
        let service = TaximeterService::new(Arc::new(fixed_clock()), repo.clone());
        let mut output = Vec::new();
        run(&service, &users, script.as_bytes(), &mut output)
            .await
            .unwrap();
        (String::from_utf8(output).unwrap(), repo)
    }

    #[test]
    fn commands_parse() {
        assert_eq!("MOVE".parse::<Command>(), Ok(Command::Meter(Action::Move)));
        assert_eq!("quit".parse::<Command>(), Ok(Command::Exit));
        assert!("fly".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn full_session_prints_a_summary_and_stores_the_trip() {
        let script = format!("{LOGIN}start\n0.02\n0.05\nmove\nstop\nfinish\nexit\n");
        let (out, repo) = transcript(&script).await;
        assert!(out.starts_with("Authentication required\nUsername: Password: Welcome"));
        assert!(out.contains("Trip started. Initial state: 'stopped'."));
        assert!(out.contains("State changed to 'moving'."));
        assert!(out.contains("Total fare: €0.00"));
        assert!(out.ends_with("Goodbye!\n"));
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_credentials_end_the_session() {
        let (out, repo) = transcript("admin\nnope\nstart\n0.02\n0.05\nfinish\n").await;
        assert!(out.ends_with("Access denied. Incorrect username or password.\n"));
        assert!(!out.contains("Welcome"));
        assert_eq!(repo.stored_count(), 0);
    }

    #[tokio::test]
    async fn eof_during_login_ends_quietly() {
        let (out, _repo) = transcript("admin\n").await;
        assert_eq!(out, "Authentication required\nUsername: Password: ");
    }

    #[tokio::test]
    async fn invalid_rates_fall_back_to_defaults() {
        let (out, _repo) = transcript(&format!("{LOGIN}start\nabc\n0.05\nstatus\n")).await;
        assert_eq!(out.matches("Invalid input.").count(), 1);
        assert!(out.contains("Invalid input. Using default prices (0.02/0.05)."));
        assert!(out.contains("State: stopped"));
    }

    #[tokio::test]
    async fn errors_are_reported_without_stopping_the_loop() {
        let script = format!("{LOGIN}finish\nmove\nstart\n1\n1\nstart\nfly\ntrips\nexit\n");
        let (out, repo) = transcript(&script).await;
        assert_eq!(out.matches("Error: no trip is in progress.").count(), 2);
        assert!(out.contains("Error: a trip is already in progress."));
        assert!(out.contains("Unknown command."));
        assert!(out.contains("No trips recorded yet."));
        assert_eq!(repo.stored_count(), 0);
    }
}
