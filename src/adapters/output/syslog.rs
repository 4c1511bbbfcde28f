use std::io;

use syslog::{Facility, Formatter3164, Logger, LoggerBackend};

use crate::ports::output::OutputSink;

/// Syslog message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

/// Facility name table, including the traditional aliases.
const FACILITIES: &[(&str, Facility)] = &[
    ("kern", Facility::LOG_KERN),
    ("user", Facility::LOG_USER),
    ("mail", Facility::LOG_MAIL),
    ("daemon", Facility::LOG_DAEMON),
    ("auth", Facility::LOG_AUTH),
    ("security", Facility::LOG_AUTH),
    ("syslog", Facility::LOG_SYSLOG),
    ("lpr", Facility::LOG_LPR),
    ("news", Facility::LOG_NEWS),
    ("uucp", Facility::LOG_UUCP),
    ("cron", Facility::LOG_CRON),
    ("authpriv", Facility::LOG_AUTHPRIV),
    ("ftp", Facility::LOG_FTP),
    ("local0", Facility::LOG_LOCAL0),
    ("local1", Facility::LOG_LOCAL1),
    ("local2", Facility::LOG_LOCAL2),
    ("local3", Facility::LOG_LOCAL3),
    ("local4", Facility::LOG_LOCAL4),
    ("local5", Facility::LOG_LOCAL5),
    ("local6", Facility::LOG_LOCAL6),
    ("local7", Facility::LOG_LOCAL7),
];

/// Severity name table, including the traditional aliases.
const SEVERITIES: &[(&str, Severity)] = &[
    ("emerg", Severity::Emerg),
    ("panic", Severity::Emerg),
    ("alert", Severity::Alert),
    ("crit", Severity::Crit),
    ("err", Severity::Err),
    ("error", Severity::Err),
    ("warning", Severity::Warning),
    ("warn", Severity::Warning),
    ("notice", Severity::Notice),
    ("info", Severity::Info),
    ("debug", Severity::Debug),
];

pub fn facility_from_str(name: &str) -> Option<Facility> {
    FACILITIES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, facility)| *facility)
}

pub fn severity_from_str(name: &str) -> Option<Severity> {
    SEVERITIES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, severity)| *severity)
}

/// Discrete sink logging each write as one syslog message at a fixed
/// facility and severity.
pub struct SyslogOutput {
    logger: Logger<LoggerBackend, Formatter3164>,
    severity: Severity,
}

impl SyslogOutput {
    pub fn open(facility: Facility, severity: Severity) -> io::Result<Self> {
        let formatter = Formatter3164 {
            facility,
            hostname: None,
            process: "audoc".into(),
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(Self { logger, severity })
    }
}

impl OutputSink for SyslogOutput {
    fn is_continuous(&self) -> bool {
        false
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let message = String::from_utf8_lossy(bytes).into_owned();
        let result = match self.severity {
            Severity::Emerg => self.logger.emerg(message),
            Severity::Alert => self.logger.alert(message),
            Severity::Crit => self.logger.crit(message),
            Severity::Err => self.logger.err(message),
            Severity::Warning => self.logger.warning(message),
            Severity::Notice => self.logger.notice(message),
            Severity::Info => self.logger.info(message),
            Severity::Debug => self.logger.debug(message),
        };
        result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}
