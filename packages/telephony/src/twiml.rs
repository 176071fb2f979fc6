//! `TwiML` response builder.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Settings of a `<Record>` verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// URL Twilio posts to when recording ends.
    pub action: String,
    /// Maximum length in seconds.
    pub max_length: u32,
    /// Key that ends the recording.
    pub finish_on_key: char,
    /// Whether to play a beep first.
    pub play_beep: bool,
    /// URL notified once the recording file is available.
    pub status_callback: Option<String>,
}

impl Record {
    /// A 60 second recording finished with `#`.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            max_length: 60,
            finish_on_key: '#',
            play_beep: true,
            status_callback: None,
        }
    }

    /// Sets the recording status callback.
    #[must_use]
    pub fn with_status_callback(mut self, url: impl Into<String>) -> Self {
        self.status_callback = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say {
        text: String,
        voice: Option<&'static str>,
    },
    Gather {
        action: String,
        num_digits: u32,
        timeout: u32,
    },
    Record(Record),
    Dial(String),
    Redirect(String),
    Pause(u32),
    Hangup,
}

/// A `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    verbs: Vec<Verb>,
}

impl Response {
    /// An empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Speaks `text` with the default voice.
    #[must_use]
    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say {
            text: text.into(),
            voice: None,
        });
        self
    }

    /// Speaks `text` with a named voice.
    #[must_use]
    pub fn say_as(mut self, voice: &'static str, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say {
            text: text.into(),
            voice: Some(voice),
        });
        self
    }

    /// Collects `num_digits` keypresses and posts them to `action`.
    #[must_use]
    pub fn gather(mut self, action: impl Into<String>, num_digits: u32, timeout: u32) -> Self {
        self.verbs.push(Verb::Gather {
            action: action.into(),
            num_digits,
            timeout,
        });
        self
    }

    /// Records the caller.
    #[must_use]
    pub fn record(mut self, record: Record) -> Self {
        self.verbs.push(Verb::Record(record));
        self
    }

    /// Connects the call to `number`.
    #[must_use]
    pub fn dial(mut self, number: impl Into<String>) -> Self {
        self.verbs.push(Verb::Dial(number.into()));
        self
    }

    /// Continues the call at `url`.
    #[must_use]
    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(url.into()));
        self
    }

    /// Waits `seconds`.
    #[must_use]
    pub fn pause(mut self, seconds: u32) -> Self {
        self.verbs.push(Verb::Pause(seconds));
        self
    }

    /// Ends the call.
    #[must_use]
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Renders the document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);

        for verb in &self.verbs {
            // Writing to a String cannot fail.
            let _ = match verb {
                Verb::Say { text, voice: None } => write!(xml, "<Say>{}</Say>", escape(text)),
                Verb::Say {
                    text,
                    voice: Some(voice),
                } => write!(xml, r#"<Say voice="{voice}">{}</Say>"#, escape(text)),
                Verb::Gather {
                    action,
                    num_digits,
                    timeout,
                } => write!(
                    xml,
                    r#"<Gather action="{}" method="POST" timeout="{timeout}" numDigits="{num_digits}"/>"#,
                    escape(action)
                ),
                Verb::Record(record) => write_record(&mut xml, record),
                Verb::Dial(number) => write!(xml, "<Dial>{}</Dial>", escape(number)),
                Verb::Redirect(url) => write!(xml, r#"<Redirect method="POST">{}</Redirect>"#, escape(url)),
                Verb::Pause(seconds) => write!(xml, r#"<Pause length="{seconds}"/>"#),
                Verb::Hangup => write!(xml, "<Hangup/>"),
            };
        }

        xml.push_str("</Response>");
        xml
    }
}

fn write_record(xml: &mut String, record: &Record) -> std::fmt::Result {
    write!(
        xml,
        r#"<Record action="{}" method="POST" maxLength="{}" finishOnKey="{}" playBeep="{}""#,
        escape(&record.action),
        record.max_length,
        escape(&record.finish_on_key.to_string()),
        record.play_beep,
    )?;
    if let Some(callback) = &record.status_callback {
        write!(
            xml,
            r#" recordingStatusCallback="{}" recordingStatusCallbackMethod="POST""#,
            escape(callback)
        )?;
    }
    xml.push_str("/>");
    Ok(())
}

/// Escapes text for use in XML content and attribute values.
#[must_use]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
