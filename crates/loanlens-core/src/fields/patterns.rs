//! Regex patterns for field normalization and borrower recovery.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "04 November 2009"
    pub static ref DATE_LONG: Regex = Regex::new(
        r"\b([0-9]{1,2})\s+(January|February|March|April|May|June|July|August|September|October|November|December)\s+([0-9]{4})"
    ).unwrap();

    // "31/12/2020", "31-12-20"
    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"\b([0-9]{1,2})[/-]([0-9]{1,2})[/-]([0-9]{2,4})\b"
    ).unwrap();

    pub static ref RATE: Regex = Regex::new(
        r"[0-9]+(\.[0-9]+)?%"
    ).unwrap();

    pub static ref NON_DIGIT: Regex = Regex::new(
        r"[^0-9]"
    ).unwrap();

    // A capitalized name followed by a parenthetical naming it the Borrower
    pub static ref BORROWER_DESIGNATION: Regex = Regex::new(
        r"\b([A-Z][\w\s,&.-]+?)\s+\(.*?Borrower.*?\)"
    ).unwrap();
}

/// Month number for an English month name.
pub fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "January" => 1,
        "February" => 2,
        "March" => 3,
        "April" => 4,
        "May" => 5,
        "June" => 6,
        "July" => 7,
        "August" => 8,
        "September" => 9,
        "October" => 10,
        "November" => 11,
        "December" => 12,
        _ => return None,
    };
    Some(month)
}
