//! Turns one generator command into a `VoiceRequest`.
//!
//! `click width:30 drum:kh bend` names the generator, then sets `width` to 30,
//! `drum` to "kh" and `bend` to true. Values are read as booleans, integers,
//! floats or text, in that order of preference.

use crate::{
    config::Config,
    params::{GeneratorSpec, ParamValue, VoiceRequest},
};

/// Decode `command` against the configured generators.
///
/// `None` when the command is blank or names a generator the config does not
/// list.
pub fn decode(command: &str, config: &Config) -> Option<VoiceRequest> {
    let mut tokens = command.split_whitespace();
    let name = tokens.next()?;
    let declared = config.generator(name)?;

    let mut request = VoiceRequest {
        generator: GeneratorSpec::new(name).with_params(declared.clone()),
        ..VoiceRequest::default()
    };

    for token in tokens {
        let (key, value) = match token.split_once(':') {
            Some((key, value)) => (key, ParamValue::parse(value)),
            None => (token, ParamValue::Bool(true)),
        };
        if key.is_empty() {
            log::debug!("ignoring token `{token}` without a key");
            continue;
        }
        request.values.insert(key.to_string(), value);
    }

    Some(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamMap;

    fn config() -> Config {
        let mut config = Config::default();
        let mut click = ParamMap::new();
        click.insert("width".into(), ParamValue::Int(20));
        config.generators.insert("click".into(), click);
        config
    }

    #[test]
    fn blank_or_unknown_is_the_sentinel() {
        assert!(decode("", &config()).is_none());
        assert!(decode("   ", &config()).is_none());
        assert!(decode("drone o:3", &config()).is_none());
    }

    #[test]
    fn tokens_become_typed_values() {
        let request = decode("pulse beats:3 freq:330.5 shape:tri reverse", &config()).unwrap();

        assert_eq!(request.generator.name, "pulse");
        assert_eq!(request.values["beats"], ParamValue::Int(3));
        assert_eq!(request.values["freq"], ParamValue::Float(330.5));
        assert_eq!(request.values["shape"], ParamValue::Text("tri".into()));
        assert_eq!(request.values["reverse"], ParamValue::Bool(true));
    }

    #[test]
    fn declared_defaults_travel_with_the_generator() {
        let request = decode("click width:60", &config()).unwrap();

        assert_eq!(request.generator.params["width"], ParamValue::Int(20));
        assert_eq!(request.values["width"], ParamValue::Int(60));
    }

    #[test]
    fn explicit_false_is_kept() {
        let request = decode("click bend:false", &config()).unwrap();
        assert_eq!(request.values["bend"], ParamValue::Bool(false));
    }
}
