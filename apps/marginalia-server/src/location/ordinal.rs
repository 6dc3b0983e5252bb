//! Front-matter page ordinals: roman numerals and letter labels

const ROMAN_DIGITS: [(char, u32); 7] = [
    ('M', 1000),
    ('D', 500),
    ('C', 100),
    ('L', 50),
    ('X', 10),
    ('V', 5),
    ('I', 1),
];

fn roman_digit(c: char) -> Option<u32> {
    let upper = c.to_ascii_uppercase();
    ROMAN_DIGITS.iter().find(|(d, _)| *d == upper).map(|(_, v)| *v)
}

/// True when every character is a roman digit (either case)
pub fn is_roman(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| roman_digit(c).is_some())
}

/// Convert a roman numeral to an integer
///
/// Uses the subtractive rule only: a digit followed by a larger one counts
/// negative. Non-canonical forms such as `IIII` are accepted.
pub fn roman_to_int(label: &str) -> Option<u32> {
    let values: Vec<u32> = label.chars().map(roman_digit).collect::<Option<_>>()?;
    if values.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    for (i, value) in values.iter().enumerate() {
        let value = i64::from(*value);
        match values.get(i + 1) {
            Some(next) if i64::from(*next) > value => total -= value,
            _ => total += value,
        }
    }

    u32::try_from(total).ok().filter(|t| *t > 0)
}

/// Bijective base-26 ordinal of a letter label: a=1, z=26, aa=27
pub fn alphabetic_to_int(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    label.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_lowercase() as u8 - b'a' + 1);
        acc.checked_mul(26)?.checked_add(digit)
    })
}
