// CrashGuard - Cellular Modem (AT command SMS)
//
// Text-mode SMS over a UART. Bodies in the ASCII subset of the GSM alphabet
// go out byte for byte; anything else switches the modem to UCS2 and
// hex-encodes both recipient and body.

use std::time::Duration;

use anyhow::{anyhow, bail, Context};

use crate::config::{MODEM_COMMAND_TIMEOUT_MS, MODEM_SEND_TIMEOUT_MS};
use crate::platform::{MessageSender, SerialLink};
use crate::sms::{self, Encoding};

const CTRL_Z: u8 = 0x1A;
const READ_SLICE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Ok,
    Prompt,
}

pub struct AtModem<L> {
    link: L,
    command_timeout: Duration,
    send_timeout: Duration,
    configured: bool,
}

impl<L: SerialLink> AtModem<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            command_timeout: Duration::from_millis(MODEM_COMMAND_TIMEOUT_MS),
            send_timeout: Duration::from_millis(MODEM_SEND_TIMEOUT_MS),
            configured: false,
        }
    }

    pub fn with_timeouts(mut self, command: Duration, send: Duration) -> Self {
        self.command_timeout = command;
        self.send_timeout = send;
        self
    }

    /// Boot self-test: does the modem answer `AT`?
    pub fn is_connected(&mut self) -> bool {
        self.command("AT").is_ok()
    }

    fn configure(&mut self) -> anyhow::Result<()> {
        if !self.configured {
            self.command("ATE0")?;
            self.command("AT+CMGF=1")?;
            self.configured = true;
        }
        Ok(())
    }

    fn command(&mut self, cmd: &str) -> anyhow::Result<String> {
        self.link.write_all(format!("{cmd}\r").as_bytes())?;
        self.wait_for(Reply::Ok, self.command_timeout)
            .with_context(|| format!("command {cmd}"))
    }

    fn send_part(&mut self, number: &str, payload: &str) -> anyhow::Result<()> {
        self.link.write_all(format!("AT+CMGS=\"{number}\"\r").as_bytes())?;
        self.wait_for(Reply::Prompt, self.command_timeout)
            .context("waiting for CMGS prompt")?;

        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload.as_bytes());
        frame.push(CTRL_Z);
        self.link.write_all(&frame)?;

        let reply = self.wait_for(Reply::Ok, self.send_timeout).context("waiting for network ack")?;
        if !reply.contains("+CMGS") {
            log::debug!("Modem acknowledged without message reference: {}", reply.trim());
        }
        Ok(())
    }

    fn wait_for(&mut self, expected: Reply, timeout: Duration) -> anyhow::Result<String> {
        let deadline = crate::now_ms() + timeout.as_millis() as u64;
        let mut response = String::new();
        let mut buf = [0u8; 64];

        loop {
            if response.contains("ERROR") {
                bail!("modem replied {}", response.trim());
            }
            let done = match expected {
                Reply::Ok => response.contains("OK\r\n"),
                Reply::Prompt => response.contains('>'),
            };
            if done {
                return Ok(response);
            }

            let remaining = deadline.saturating_sub(crate::now_ms());
            if remaining == 0 {
                return Err(anyhow!("timed out, got {:?}", response.trim()));
            }
            let n = self.link.read(&mut buf, remaining.min(READ_SLICE_MS))?;
            response.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }
}

impl<L: SerialLink> MessageSender for AtModem<L> {
    fn send(&mut self, recipient: &str, body: &str) -> anyhow::Result<()> {
        self.configure()?;

        let parts = sms::split(body);
        let encoding = Encoding::for_text(body);
        let number = match encoding {
            Encoding::Gsm7 => {
                self.command("AT+CSCS=\"GSM\"")?;
                self.command("AT+CSMP=17,167,0,0")?;
                recipient.to_string()
            }
            Encoding::Ucs2 => {
                self.command("AT+CSCS=\"UCS2\"")?;
                self.command("AT+CSMP=17,167,0,8")?;
                sms::ucs2_hex(recipient)
            }
        };

        let count = parts.len();
        for (index, part) in parts.iter().enumerate() {
            let payload = match encoding {
                // ASCII-coded GSM characters: the UTF-8 bytes are the GSM codes.
                Encoding::Gsm7 => part.clone(),
                Encoding::Ucs2 => sms::ucs2_hex(part),
            };
            self.send_part(&number, &payload)
                .with_context(|| format!("part {}/{count}", index + 1))?;
        }
        log::debug!("SMS to {recipient} sent in {count} part(s) ({encoding:?})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedLink;

    const OK: &str = "\r\nOK\r\n";

    fn modem(replies: &[&'static str]) -> (AtModem<ScriptedLink>, std::sync::Arc<std::sync::Mutex<Vec<String>>>) {
        let link = ScriptedLink::with_replies(replies.iter().copied());
        let written = link.written();
        let modem = AtModem::new(link)
            .with_timeouts(Duration::from_millis(30), Duration::from_millis(30));
        (modem, written)
    }

    #[test]
    fn sends_gsm_text_in_one_part() {
        let (mut modem, written) = modem(&[
            OK, OK, OK, OK, // ATE0, CMGF, CSCS, CSMP
            "\r\n> ",
            "\r\n+CMGS: 17\r\n\r\nOK\r\n",
        ]);
        modem.send("+905551112233", "Crash at 41.0,29.0").unwrap();

        let written = written.lock().unwrap().clone();
        assert_eq!(
            written,
            vec![
                "ATE0\r",
                "AT+CMGF=1\r",
                "AT+CSCS=\"GSM\"\r",
                "AT+CSMP=17,167,0,0\r",
                "AT+CMGS=\"+905551112233\"\r",
                "Crash at 41.0,29.0\u{1a}",
            ]
        );
    }

    #[test]
    fn turkish_text_goes_out_as_ucs2_hex() {
        let (mut modem, written) = modem(&[OK, OK, OK, OK, "> ", "+CMGS: 3\r\nOK\r\n"]);
        modem.send("+90", "ş").unwrap();

        let written = written.lock().unwrap().clone();
        assert_eq!(written[2], "AT+CSCS=\"UCS2\"\r");
        assert_eq!(written[3], "AT+CSMP=17,167,0,8\r");
        assert_eq!(written[4], "AT+CMGS=\"002B00390030\"\r");
        assert_eq!(written[5], "015F\u{1a}");
    }

    #[test]
    fn long_body_is_sent_part_by_part() {
        let body = "x".repeat(200);
        let (mut modem, written) = modem(&[OK, OK, OK, OK, "> ", OK, "> ", OK]);
        modem.send("+1", &body).unwrap();

        let written = written.lock().unwrap().clone();
        let cmgs = written.iter().filter(|w| w.starts_with("AT+CMGS")).count();
        assert_eq!(cmgs, 2);
        assert_eq!(written[5].len(), 160 + 1);
        assert_eq!(written[7].len(), 40 + 1);
    }

    #[test]
    fn gsm_letters_outside_ascii_are_not_written_as_utf8() {
        let (mut modem, written) = modem(&[OK, OK, OK, OK, "> ", OK]);
        modem.send("+1", "Café £5 Ä").unwrap();

        let written = written.lock().unwrap().clone();
        assert_eq!(written[2], "AT+CSCS=\"UCS2\"\r");
        assert_eq!(written[4], "AT+CMGS=\"002B0031\"\r");
        assert_eq!(written[5], "00430061006600E9002000A30035002000C4\u{1a}");
        assert!(written[5].is_ascii());
    }

    #[test]
    fn gsm_payload_bytes_match_the_text() {
        let (mut modem, written) = modem(&[OK, OK, OK, OK, "> ", OK]);
        modem.send("+1", "Speed 72.0 km/h?").unwrap();

        let written = written.lock().unwrap().clone();
        assert_eq!(written[2], "AT+CSCS=\"GSM\"\r");
        assert_eq!(written[5].as_bytes(), b"Speed 72.0 km/h?\x1a");
    }

    #[test]
    fn network_error_fails_the_send() {
        let (mut modem, _) = modem(&[OK, OK, OK, OK, "> ", "\r\n+CMS ERROR: 500\r\n"]);
        let err = modem.send("+905551112233", "hi").unwrap_err();
        assert!(format!("{err:#}").contains("+CMS ERROR: 500"));
    }

    #[test]
    fn silent_modem_times_out() {
        let (mut modem, _) = modem(&[]);
        assert!(modem.send("+1", "hi").is_err());
        assert!(!modem.is_connected());
    }

    #[test]
    fn configuration_happens_once() {
        let (mut modem, written) = modem(&[
            OK, OK, OK, OK, "> ", OK, // first message
            OK, OK, "> ", OK,         // second message: CSCS, CSMP, CMGS, body
        ]);
        modem.send("+1", "a").unwrap();
        modem.send("+2", "b").unwrap();

        let written = written.lock().unwrap().clone();
        assert_eq!(written.iter().filter(|w| w.as_str() == "AT+CMGF=1\r").count(), 1);
        assert_eq!(written.last().map(String::as_str), Some("b\u{1a}"));
    }
}
