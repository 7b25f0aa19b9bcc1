// CrashGuard - GNSS Receiver
//
// NMEA over a UART. The receiver streams once per second. A location query
// throws away whatever queued up since the last one, listens live, and
// answers with a fix heard now or one recent enough to still be useful.

use std::time::Duration;

use anyhow::bail;

use crate::config::{GNSS_FIX_MAX_AGE_MS, LOCATION_QUERY_TIMEOUT_MS};
use crate::events::Location;
use crate::nmea;
use crate::platform::{LocationProvider, SerialLink};

const MAX_SENTENCE_LEN: usize = 128;
const READ_SLICE_MS: u64 = 100;

pub struct GnssReceiver<L> {
    link: L,
    line: Vec<u8>,
    last_fix: Option<Location>,
    fix_at_ms: u64,
    fixes_received: u64,
    sentences_seen: usize,
    query_timeout: Duration,
    max_fix_age: Duration,
}

impl<L: SerialLink> GnssReceiver<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            line: Vec::with_capacity(MAX_SENTENCE_LEN),
            last_fix: None,
            fix_at_ms: 0,
            fixes_received: 0,
            sentences_seen: 0,
            query_timeout: Duration::from_millis(LOCATION_QUERY_TIMEOUT_MS),
            max_fix_age: Duration::from_millis(GNSS_FIX_MAX_AGE_MS),
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_max_fix_age(mut self, age: Duration) -> Self {
        self.max_fix_age = age;
        self
    }

    /// Boot self-test: did any well-formed sentence arrive within `timeout`?
    pub fn is_connected(&mut self, timeout: Duration) -> bool {
        let before = self.sentences_seen;
        if let Err(e) = self.pump(timeout) {
            log::warn!("GNSS link error: {e}");
        }
        self.sentences_seen > before
    }

    /// Read for up to `budget`, returning early once the line goes idle
    /// after at least one sentence arrived in this call.
    fn pump(&mut self, budget: Duration) -> anyhow::Result<()> {
        let deadline = crate::now_ms() + budget.as_millis() as u64;
        let seen_before = self.sentences_seen;
        let mut buf = [0u8; 64];

        loop {
            let remaining = deadline.saturating_sub(crate::now_ms());
            if remaining == 0 {
                return Ok(());
            }

            let n = self.link.read(&mut buf, remaining.min(READ_SLICE_MS))?;
            if n == 0 {
                if self.sentences_seen > seen_before {
                    return Ok(());
                }
                continue;
            }

            for &byte in &buf[..n] {
                self.feed(byte);
            }
        }
    }

    fn feed(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                let line = std::mem::take(&mut self.line);
                self.handle_sentence(&line);
            }
            b'\r' => {}
            _ if self.line.len() >= MAX_SENTENCE_LEN => {
                log::debug!("GNSS sentence overflow - resyncing");
                self.line.clear();
            }
            _ => self.line.push(byte),
        }
    }

    fn handle_sentence(&mut self, line: &[u8]) {
        let Ok(text) = std::str::from_utf8(line) else {
            return;
        };
        match nmea::parse_rmc(text) {
            Ok(fix) => {
                self.sentences_seen += 1;
                if fix.is_some() {
                    self.last_fix = fix;
                    self.fix_at_ms = crate::now_ms();
                    self.fixes_received += 1;
                }
            }
            Err(e) => log::debug!("Dropping NMEA sentence: {e}"),
        }
    }
}

impl<L: SerialLink> LocationProvider for GnssReceiver<L> {
    fn last_known(&mut self) -> anyhow::Result<Location> {
        // Queued sentences may date from boot; only live ones count.
        self.link.clear_input()?;
        self.line.clear();

        let before = self.fixes_received;
        self.pump(self.query_timeout)?;

        let Some(fix) = self.last_fix else {
            bail!("no GNSS fix yet");
        };
        if self.fixes_received > before {
            return Ok(fix);
        }

        let age_ms = crate::now_ms().saturating_sub(self.fix_at_ms);
        if age_ms > self.max_fix_age.as_millis() as u64 {
            bail!("last GNSS fix is {age_ms} ms old");
        }
        log::debug!("No live fix - reporting one from {age_ms} ms ago");
        Ok(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedLink;

    const FIX_ISTANBUL: &str = "$GNRMC,083559.00,A,4100.0000,N,02900.0000,E,38.877,77.52,091202,,,A*70\r\n";
    const FIX_MUNICH: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";
    const VOID: &str = "$GPRMC,225446,V,4916.45,N,12311.12,W,000.5,054.7,191194,020.3,E*7F\r\n";

    /// A receiver whose line carries `live` once the query starts listening.
    fn receiver(live: &str) -> GnssReceiver<ScriptedLink> {
        GnssReceiver::new(ScriptedLink::default().then_incoming(live.as_bytes()))
            .with_query_timeout(Duration::from_millis(50))
    }

    #[test]
    fn returns_newest_valid_fix() {
        let mut gnss = receiver(&format!("{FIX_MUNICH}{FIX_ISTANBUL}"));
        let fix = gnss.last_known().unwrap();
        assert_eq!((fix.latitude, fix.longitude), (41.0, 29.0));
    }

    #[test]
    fn void_sentence_keeps_previous_fix() {
        let mut gnss = receiver(&format!("{FIX_ISTANBUL}{VOID}"));
        let fix = gnss.last_known().unwrap();
        assert_eq!(fix.latitude, 41.0);
    }

    #[test]
    fn no_fix_is_an_error() {
        let mut gnss = receiver(VOID);
        assert!(gnss.last_known().is_err());

        let mut silent = receiver("");
        assert!(silent.last_known().is_err());
    }

    #[test]
    fn garbage_and_partial_lines_are_skipped() {
        let noise = "\u{1}\u{2}garbage*ZZ\r\n$GPRMC,123519,A,4807";
        let mut gnss = receiver(&format!("{noise}\r\n{FIX_ISTANBUL}"));
        assert_eq!(gnss.last_known().unwrap().longitude, 29.0);
    }

    #[test]
    fn queued_backlog_is_discarded_for_the_live_fix() {
        let link = ScriptedLink::with_incoming(FIX_MUNICH.as_bytes()).then_incoming(FIX_ISTANBUL.as_bytes());
        let mut gnss = GnssReceiver::new(link).with_query_timeout(Duration::from_millis(50));
        let fix = gnss.last_known().unwrap();
        assert_eq!((fix.latitude, fix.longitude), (41.0, 29.0));
    }

    #[test]
    fn backlog_alone_is_not_a_fix() {
        let link = ScriptedLink::with_incoming(FIX_ISTANBUL.as_bytes());
        let mut gnss = GnssReceiver::new(link).with_query_timeout(Duration::from_millis(50));
        assert!(gnss.last_known().is_err());
    }

    #[test]
    fn recent_fix_survives_between_queries() {
        let mut gnss = receiver(FIX_ISTANBUL);
        gnss.last_known().unwrap();
        // Nothing new on the line: the fix from the last query is still fresh.
        assert_eq!(gnss.last_known().unwrap().latitude, 41.0);
    }

    #[test]
    fn expired_fix_is_not_reported() {
        let mut gnss = receiver(FIX_ISTANBUL).with_max_fix_age(Duration::ZERO);
        gnss.last_known().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(gnss.last_known().is_err());
    }

    #[test]
    fn self_test_counts_any_valid_sentence() {
        let mut gnss = receiver(VOID);
        assert!(gnss.is_connected(Duration::from_millis(50)));
        let mut silent = receiver("");
        assert!(!silent.is_connected(Duration::from_millis(20)));
    }
}
