use std::{str::FromStr, time::Duration};
use crate::error::{AppErr, AppResult};

/// Runtime knobs, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:          String,
    pub room_capacity:      usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout:  Duration,
    pub request_phase:      Duration,
    pub vote_phase:         Duration,
    pub countdown_tick:     Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr:          "0.0.0.0:3000".into(),
            room_capacity:      4,
            heartbeat_interval: Duration::from_secs(60),
            heartbeat_timeout:  Duration::from_secs(90),
            request_phase:      Duration::from_secs(60),
            vote_phase:         Duration::from_secs(30),
            countdown_tick:     Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Expects `.env` to have been loaded already.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds a config from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(get: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Ok(Self {
            bind_addr:          get("BIND_ADDR").unwrap_or(d.bind_addr),
            room_capacity:      positive(&get, "ROOM_CAPACITY", d.room_capacity)?,
            heartbeat_interval: secs(&get, "HEARTBEAT_INTERVAL_SECS", d.heartbeat_interval)?,
            heartbeat_timeout:  secs(&get, "HEARTBEAT_TIMEOUT_SECS", d.heartbeat_timeout)?,
            request_phase:      secs(&get, "REQUEST_PHASE_SECS", d.request_phase)?,
            vote_phase:         secs(&get, "VOTE_PHASE_SECS", d.vote_phase)?,
            countdown_tick:     secs(&get, "COUNTDOWN_TICK_SECS", d.countdown_tick)?,
        })
    }
}

fn positive<F, T>(get: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = get(key) else { return Ok(default) };
    let v: T = raw.trim().parse()
        .map_err(|_| AppErr::Config(format!("{key}={raw} is not a number")))?;
    if v <= T::default() {
        return Err(AppErr::Config(format!("{key} must be greater than zero")));
    }
    Ok(v)
}

fn secs<F>(get: &F, key: &str, default: Duration) -> AppResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    positive(get, key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let c = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c.room_capacity, 4);
        assert_eq!(c.heartbeat_timeout, Duration::from_secs(90));
        assert_eq!(c.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn overrides_are_parsed() {
        let c = Config::from_lookup(lookup(&[
            ("ROOM_CAPACITY", "5"),
            ("VOTE_PHASE_SECS", " 45 "),
        ]))
        .unwrap();
        assert_eq!(c.room_capacity, 5);
        assert_eq!(c.vote_phase, Duration::from_secs(45));
    }

    #[test]
    fn garbage_and_zero_are_rejected() {
        let err = Config::from_lookup(lookup(&[("ROOM_CAPACITY", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ROOM_CAPACITY"));
        assert!(Config::from_lookup(lookup(&[("REQUEST_PHASE_SECS", "0")])).is_err());
    }
}
