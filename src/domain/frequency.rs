use chrono::{DateTime, Duration, Utc};

const DAILY_WINDOW_MINUTES: i64 = 24 * 60;
const WEEKLY_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// How often a subscription wants to receive listings.
///
/// Values read back from the store that are neither `daily` nor `weekly` are kept as
/// `Unrecognized` instead of failing the whole row, so the delivery pass can still run them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Unrecognized(String),
}

impl Frequency {
    /// Strict parsing used on user input: only `daily` and `weekly` are accepted.
    pub fn parse(frequency: String) -> Result<Frequency, String> {
        match frequency.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(format!("{} is not a valid frequency", frequency)),
        }
    }

    /// Lenient parsing used at the store boundary.
    pub fn from_stored(frequency: String) -> Frequency {
        Frequency::parse(frequency.clone()).unwrap_or(Frequency::Unrecognized(frequency))
    }

    /// Minimum number of minutes between two deliveries.
    pub fn window_minutes(&self) -> Option<i64> {
        match self {
            Frequency::Daily => Some(DAILY_WINDOW_MINUTES),
            Frequency::Weekly => Some(WEEKLY_WINDOW_MINUTES),
            Frequency::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Frequency::Unrecognized(_))
    }
}

impl AsRef<str> for Frequency {
    fn as_ref(&self) -> &str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Unrecognized(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyDecision {
    pub skip: bool,
    /// Minutes the listings query should look back. Zero means "unknown, do not filter".
    pub reference_minutes: i64,
}

/// Decides whether a subscription is due at `now`.
///
/// A subscription that was never sent is due right away and looks back one full window.
/// Otherwise it is due once a full window has elapsed, and then looks back over the whole
/// elapsed time so nothing published since the last send is missed.
pub fn decide(
    frequency: &Frequency,
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> FrequencyDecision {
    let window = match frequency.window_minutes() {
        Some(window) => window,
        None => {
            return FrequencyDecision {
                skip: false,
                reference_minutes: 0,
            }
        }
    };

    match last_sent {
        None => FrequencyDecision {
            skip: false,
            reference_minutes: window,
        },
        Some(last_sent) => {
            let elapsed = now.signed_duration_since(last_sent);

            FrequencyDecision {
                skip: elapsed < Duration::minutes(window),
                reference_minutes: elapsed.num_minutes(),
            }
        }
    }
}
