//! Radio phraseology: phonetic call signs and message assembly.

use crate::channel::RequestKind;

/// ICAO spelling of a single character, if it has one.
pub fn phonetic_word(c: char) -> Option<&'static str> {
    let word = match c.to_ascii_uppercase() {
        'A' => "Alpha",
        'B' => "Bravo",
        'C' => "Charlie",
        'D' => "Delta",
        'E' => "Echo",
        'F' => "Foxtrot",
        'G' => "Golf",
        'H' => "Hotel",
        'I' => "India",
        'J' => "Juliett",
        'K' => "Kilo",
        'L' => "Lima",
        'M' => "Mike",
        'N' => "November",
        'O' => "Oscar",
        'P' => "Papa",
        'Q' => "Quebec",
        'R' => "Romeo",
        'S' => "Sierra",
        'T' => "Tango",
        'U' => "Uniform",
        'V' => "Victor",
        'W' => "Whiskey",
        'X' => "Xray",
        'Y' => "Yankee",
        'Z' => "Zulu",
        '0' => "Zero",
        '1' => "One",
        '2' => "Two",
        '3' => "Three",
        '4' => "Four",
        '5' => "Five",
        '6' => "Six",
        '7' => "Seven",
        '8' => "Eight",
        '9' => "Niner",
        _ => return None,
    };
    Some(word)
}

/// Spell a call sign phonetically. Characters without a spelling are dropped.
pub fn phonetic(callsign: &str) -> String {
    callsign
        .chars()
        .filter_map(phonetic_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// "<controller>, <spelled tail>, <payload>."
pub fn request_text(to_whom: &str, from_tail: &str, payload: &str) -> String {
    format!("{}, {}, {}.", to_whom, phonetic(from_tail), payload)
}

/// "<spelled tail>, <controller>, <what>."
pub fn response_text(to_tail: &str, from_whom: &str, what: &str) -> String {
    format!("{}, {}, {}.", phonetic(to_tail), from_whom, what)
}

/// Body of a controller response to a request of `kind`.
pub fn response_what(kind: RequestKind, info: &str) -> String {
    match kind {
        RequestKind::DepartureRunway => format!("departure using runway {}", info),
        RequestKind::Pushback => format!("clear to pushback runway {}", info),
    }
}

pub fn departure_runway_payload() -> String {
    "departure runway request".to_string()
}

pub fn pushback_payload(runway: &str) -> String {
    format!("request pushback to runway {}", runway)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phonetic_tail() {
        assert_eq!(phonetic("N12AB"), "November One Two Alpha Bravo");
        assert_eq!(phonetic("N9-x"), "November Niner Xray");
    }

    #[test]
    fn test_request_and_response_text() {
        assert_eq!(
            request_text("PaloAlto ground", "N34KZ", &departure_runway_payload()),
            "PaloAlto ground, November Three Four Kilo Zulu, departure runway request."
        );
        let what = response_what(RequestKind::Pushback, "31");
        assert_eq!(
            response_text("N34KZ", "PaloAlto ground", &what),
            "November Three Four Kilo Zulu, PaloAlto ground, clear to pushback runway 31."
        );
        assert_eq!(
            response_what(RequestKind::DepartureRunway, "31"),
            "departure using runway 31"
        );
    }
}
