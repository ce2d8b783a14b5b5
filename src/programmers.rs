//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use bioswrite_core::{open_device_with, EngineConfig, FlashDevice, Spi25Transport, SpiMaster};

/// An open chip behind whichever programmer was selected
pub type Device<'a> = FlashDevice<Spi25Transport<&'a mut dyn SpiMaster>>;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory flash emulator (size=<bytes>,image=<file>,mfr=<hex>,dev=<hex>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the primary programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.iter().any(|a| *a == name))
        .map(|p| p.name)
}

/// Open the chip behind `programmer` and run `f` on it
///
/// The programmer string can be just the name (e.g., "dummy") or include
/// parameters (e.g., "dummy:size=1M,image=flash.bin"). Programmers with a
/// backing store write it back once `f` returns, whether or not it succeeded.
#[allow(unused_variables)]
pub fn with_device<F>(
    programmer: &str,
    config: &EngineConfig,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Device<'_>) -> Result<(), Box<dyn std::error::Error>>,
{
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let dummy_config = bioswrite_dummy::parse_options(&options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            let mut master = bioswrite_dummy::DummyFlash::open(dummy_config)?;

            let result = {
                let mut device =
                    open_device_with(Spi25Transport::new(&mut master as &mut dyn SpiMaster), config)?;
                f(&mut device)
            };

            master.save_image()?;
            result
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'bioswrite list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        assert_eq!(parse_programmer_string("dummy"), ("dummy", vec![]));
        assert_eq!(
            parse_programmer_string("dummy:size=1M,image=a.bin"),
            ("dummy", vec![("size", "1M"), ("image", "a.bin")])
        );
        // Entries without '=' are dropped
        assert_eq!(
            parse_programmer_string("dummy:bogus,size=4K"),
            ("dummy", vec![("size", "4K")])
        );
    }

    #[test]
    fn test_unknown_programmer() {
        assert_eq!(find_programmer("ch341a"), None);
        let err = with_device("ch341a", &EngineConfig::default(), |_| Ok(())).unwrap_err();
        assert!(err.to_string().starts_with("Unknown programmer: ch341a"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_round_trip() {
        assert_eq!(find_programmer("emulator"), Some("dummy"));

        with_device("dummy:size=64K", &EngineConfig::default(), |device| {
            assert_eq!(device.capacity(), 0x1_0000);
            let options = device.default_options();
            device.write(0x100, &[0x42; 8], &options)?;
            assert_eq!(device.read(0x100, 8)?, vec![0x42; 8]);
            Ok(())
        })
        .unwrap();
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_bad_parameters() {
        let err = with_device("dummy:size=3K", &EngineConfig::default(), |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("Invalid dummy parameters"));
    }
}
