use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Input,
    Resolution,
    Connect,
    Response,
    Timeout,
    Protocol,
    Other,
}

impl ErrorClass {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClass::Input => 2,
            ErrorClass::Resolution => 3,
            ErrorClass::Connect => 4,
            ErrorClass::Response => 6,
            ErrorClass::Timeout => 7,
            ErrorClass::Protocol => 8,
            ErrorClass::Other => 1,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ErrorClass::Input => "INPUT",
            ErrorClass::Resolution => "DNS",
            ErrorClass::Connect => "CONNECT",
            ErrorClass::Response => "RESPONSE",
            ErrorClass::Timeout => "TIMEOUT",
            ErrorClass::Protocol => "PROTOCOL",
            ErrorClass::Other => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("error[{}]: {message}", .class.tag())]
pub struct ProbeError {
    pub class: ErrorClass,
    pub message: String,
}

impl ProbeError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into() }
    }

    pub fn input(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Input, msg) }
    pub fn resolution(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Resolution, msg) }
    pub fn connect(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Connect, msg) }
    pub fn response(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Response, msg) }
    pub fn timeout(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Timeout, msg) }
    pub fn protocol(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Protocol, msg) }
    pub fn other(msg: impl Into<String>) -> Self { Self::new(ErrorClass::Other, msg) }

    pub fn with_class(mut self, class: ErrorClass) -> Self {
        self.class = class;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_class_tag() {
        let err = ProbeError::resolution("no records for 'example.invalid'");
        assert_eq!(err.to_string(), "error[DNS]: no records for 'example.invalid'");
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let classes = [
            ErrorClass::Input,
            ErrorClass::Resolution,
            ErrorClass::Connect,
            ErrorClass::Response,
            ErrorClass::Timeout,
            ErrorClass::Protocol,
            ErrorClass::Other,
        ];
        let mut codes: Vec<i32> = classes.iter().map(|c| c.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), classes.len());
    }

    #[test]
    fn with_class_keeps_message() {
        let err = ProbeError::timeout("deadline").with_class(ErrorClass::Response);
        assert_eq!(err.class, ErrorClass::Response);
        assert_eq!(err.message, "deadline");
    }
}
