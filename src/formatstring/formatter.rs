//! Static replay of `java.util.Formatter` parsing and argument checks.
//!
//! Behavior follows JDK 17 and later: an explicit argument index of `0`
//! (`%0$s`) is rejected instead of being read as relative indexing as older
//! JDKs did.

use std::fmt;

use crate::formatstring::sample::SampleValue;

/// Why `java.util.Formatter` would reject a format string for a set of arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FormatError {
    DuplicateFlags {
        flags: String,
    },
    FlagsConversionMismatch {
        conversion: char,
        flags: String,
    },
    IllegalCodePoint {
        code_point: i32,
    },
    IllegalConversion {
        conversion: char,
        argument_class: String,
    },
    IllegalFlags {
        flags: String,
    },
    IllegalPrecision {
        precision: i32,
    },
    IllegalWidth {
        width: i32,
    },
    MissingArgument {
        specifier: String,
    },
    MissingWidth {
        specifier: String,
    },
    UnknownConversion {
        conversion: String,
    },
    /// No known format string produces this.
    #[allow(dead_code)]
    UnknownFlags {
        flags: String,
    },
    Other {
        message: String,
    },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Flags(u16);

impl Flags {
    const LEFT_JUSTIFY: Flags = Flags(1);
    const UPPERCASE: Flags = Flags(1 << 1);
    const ALTERNATE: Flags = Flags(1 << 2);
    const PLUS: Flags = Flags(1 << 3);
    const LEADING_SPACE: Flags = Flags(1 << 4);
    const ZERO_PAD: Flags = Flags(1 << 5);
    const GROUP: Flags = Flags(1 << 6);
    const PARENTHESES: Flags = Flags(1 << 7);
    const PREVIOUS: Flags = Flags(1 << 8);

    /// Rendering order used by the platform.
    const ORDER: [(Flags, char); 9] = [
        (Flags::LEFT_JUSTIFY, '-'),
        (Flags::UPPERCASE, '^'),
        (Flags::ALTERNATE, '#'),
        (Flags::PLUS, '+'),
        (Flags::LEADING_SPACE, ' '),
        (Flags::ZERO_PAD, '0'),
        (Flags::GROUP, ','),
        (Flags::PARENTHESES, '('),
        (Flags::PREVIOUS, '<'),
    ];

    fn parse(flag: char) -> Option<Flags> {
        Self::ORDER
            .iter()
            .find(|(_, symbol)| *symbol == flag && flag != '^')
            .map(|(value, _)| *value)
    }

    fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    fn without(self, other: Flags) -> Flags {
        Flags(self.0 & !other.0)
    }

    fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, symbol) in Self::ORDER {
            if self.contains(flag) {
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}

/// Index of a specifier that consumes no argument (`%%`, `%n`).
const NO_ARGUMENT: i32 = -2;
/// Index of a specifier that reuses the previous argument (`<` flag).
const PREVIOUS_ARGUMENT: i32 = -1;
/// Index of a specifier that takes the next ordinary argument.
const NEXT_ARGUMENT: i32 = 0;

const DATE_TIME_CONVERSIONS: &str = "HIklMSLNpzZsQBbhAaCYyjmdeRTrDFc";
const VALID_CONVERSIONS: &str = "bBhHsScCdoxXeEfgGaA%n";
/// Temporal fields `LocalDateTime` cannot supply.
const UNSUPPORTED_BY_LOCAL_DATE_TIME: &str = "zZsQc";

/// Text matched by the specifier grammar
/// `%(\d+\$)?([-#+ 0,(<]*)?(\d+)?(\.\d+)?([tT])?([a-zA-Z%])`.
struct RawSpecifier {
    index: Option<String>,
    flags: String,
    width: Option<String>,
    precision: Option<String>,
    date_time: Option<char>,
    conversion: char,
    end: usize,
}

fn is_conversion_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '%'
}

fn scan(chars: &[char], start: usize, accept: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while chars.get(end).is_some_and(|c| accept(*c)) {
        end += 1;
    }
    end
}

fn collect(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

/// Matches one specifier starting right after its `%`.
fn match_specifier(chars: &[char], start: usize) -> Option<RawSpecifier> {
    let mut position = start;

    let digits_end = scan(chars, position, |c| c.is_ascii_digit());
    let index = if digits_end > position && chars.get(digits_end) == Some(&'$') {
        let index = collect(chars, position, digits_end);
        position = digits_end + 1;
        Some(index)
    } else {
        None
    };

    let flags_end = scan(chars, position, |c| "-#+ 0,(<".contains(c));
    let flags = collect(chars, position, flags_end);
    position = flags_end;

    let width_end = scan(chars, position, |c| c.is_ascii_digit());
    let width = (width_end > position).then(|| collect(chars, position, width_end));
    position = width_end;

    let mut precision = None;
    if chars.get(position) == Some(&'.') {
        let precision_end = scan(chars, position + 1, |c| c.is_ascii_digit());
        if precision_end > position + 1 {
            precision = Some(collect(chars, position + 1, precision_end));
            position = precision_end;
        }
    }

    let mut date_time = None;
    if let Some(prefix @ ('t' | 'T')) = chars.get(position).copied()
        && chars.get(position + 1).is_some_and(|c| is_conversion_char(*c))
    {
        date_time = Some(prefix);
        position += 1;
    }

    let conversion = chars
        .get(position)
        .copied()
        .filter(|c| is_conversion_char(*c))?;
    Some(RawSpecifier {
        index,
        flags,
        width,
        precision,
        date_time,
        conversion,
        end: position + 1,
    })
}

/// A parsed and statically checked conversion specifier.
#[derive(Clone, Debug)]
struct Specifier {
    index: i32,
    flags: Flags,
    width: i32,
    precision: i32,
    date_time: bool,
    conversion: char,
}

impl Specifier {
    fn new(raw: &RawSpecifier) -> Result<Self, FormatError> {
        let mut index = NEXT_ARGUMENT;
        if let Some(text) = &raw.index {
            index = match text.parse::<i32>() {
                Ok(0) => {
                    return Err(FormatError::Other {
                        message: "Illegal format argument index = 0".to_string(),
                    });
                }
                Ok(value) => value,
                Err(_) => {
                    return Err(FormatError::Other {
                        message: "Format argument index: (not representable as int)".to_string(),
                    });
                }
            };
        }

        let mut flags = Flags::default();
        for symbol in raw.flags.chars() {
            let Some(flag) = Flags::parse(symbol) else {
                continue;
            };
            if flags.contains(flag) {
                return Err(FormatError::DuplicateFlags {
                    flags: symbol.to_string(),
                });
            }
            flags.insert(flag);
        }
        if flags.contains(Flags::PREVIOUS) {
            index = PREVIOUS_ARGUMENT;
        }

        let width = match &raw.width {
            Some(text) => text
                .parse::<i32>()
                .map_err(|_| FormatError::IllegalWidth { width: i32::MIN })?,
            None => -1,
        };
        let precision = match &raw.precision {
            Some(text) => text
                .parse::<i32>()
                .map_err(|_| FormatError::IllegalPrecision {
                    precision: i32::MIN,
                })?,
            None => -1,
        };

        let mut specifier = Self {
            index,
            flags,
            width,
            precision,
            date_time: false,
            conversion: raw.conversion,
        };
        if let Some(prefix) = raw.date_time {
            specifier.date_time = true;
            if prefix == 'T' {
                specifier.flags.insert(Flags::UPPERCASE);
            }
        } else {
            if !VALID_CONVERSIONS.contains(raw.conversion) {
                return Err(FormatError::UnknownConversion {
                    conversion: raw.conversion.to_string(),
                });
            }
            if raw.conversion.is_ascii_uppercase() {
                specifier.flags.insert(Flags::UPPERCASE);
                specifier.conversion = raw.conversion.to_ascii_lowercase();
            }
            if matches!(specifier.conversion, '%' | 'n') {
                specifier.index = NO_ARGUMENT;
            }
        }
        specifier.check()?;
        Ok(specifier)
    }

    fn check(&self) -> Result<(), FormatError> {
        if self.date_time {
            return self.check_date_time();
        }
        match self.conversion {
            'b' | 'h' | 's' => self.check_general(),
            'c' => self.check_character(),
            'd' | 'o' | 'x' => self.check_integer(),
            'e' | 'f' | 'g' | 'a' => self.check_float(),
            '%' | 'n' => self.check_text(),
            other => Err(FormatError::UnknownConversion {
                conversion: other.to_string(),
            }),
        }
    }

    fn check_date_time(&self) -> Result<(), FormatError> {
        if self.precision != -1 {
            return Err(self.illegal_precision());
        }
        if !DATE_TIME_CONVERSIONS.contains(self.conversion) {
            return Err(FormatError::UnknownConversion {
                conversion: format!("t{}", self.conversion),
            });
        }
        self.check_bad_flags(&[
            Flags::ALTERNATE,
            Flags::PLUS,
            Flags::LEADING_SPACE,
            Flags::ZERO_PAD,
            Flags::GROUP,
            Flags::PARENTHESES,
        ])?;
        self.require_width_for_left_justify()
    }

    fn check_general(&self) -> Result<(), FormatError> {
        if matches!(self.conversion, 'b' | 'h') && self.flags.contains(Flags::ALTERNATE) {
            return Err(self.mismatch(Flags::ALTERNATE));
        }
        self.require_width_for_left_justify()?;
        self.check_bad_flags(&[
            Flags::PLUS,
            Flags::LEADING_SPACE,
            Flags::ZERO_PAD,
            Flags::GROUP,
            Flags::PARENTHESES,
        ])
    }

    fn check_character(&self) -> Result<(), FormatError> {
        if self.precision != -1 {
            return Err(self.illegal_precision());
        }
        self.check_bad_flags(&[
            Flags::ALTERNATE,
            Flags::PLUS,
            Flags::LEADING_SPACE,
            Flags::ZERO_PAD,
            Flags::GROUP,
            Flags::PARENTHESES,
        ])?;
        self.require_width_for_left_justify()
    }

    fn check_numeric(&self) -> Result<(), FormatError> {
        if self.width == -1
            && (self.flags.contains(Flags::LEFT_JUSTIFY) || self.flags.contains(Flags::ZERO_PAD))
        {
            return Err(self.missing_width());
        }
        if (self.flags.contains(Flags::PLUS) && self.flags.contains(Flags::LEADING_SPACE))
            || (self.flags.contains(Flags::LEFT_JUSTIFY) && self.flags.contains(Flags::ZERO_PAD))
        {
            return Err(FormatError::IllegalFlags {
                flags: self.flags.to_string(),
            });
        }
        Ok(())
    }

    fn check_integer(&self) -> Result<(), FormatError> {
        self.check_numeric()?;
        if self.precision != -1 {
            return Err(self.illegal_precision());
        }
        if self.conversion == 'd' {
            self.check_bad_flags(&[Flags::ALTERNATE])
        } else {
            self.check_bad_flags(&[Flags::GROUP])
        }
    }

    fn check_float(&self) -> Result<(), FormatError> {
        self.check_numeric()?;
        match self.conversion {
            'a' => self.check_bad_flags(&[Flags::PARENTHESES, Flags::GROUP]),
            'e' => self.check_bad_flags(&[Flags::GROUP]),
            'g' => self.check_bad_flags(&[Flags::ALTERNATE]),
            _ => Ok(()),
        }
    }

    fn check_text(&self) -> Result<(), FormatError> {
        if self.precision != -1 {
            return Err(self.illegal_precision());
        }
        if self.conversion == '%' {
            if !self.flags.is_empty() && self.flags != Flags::LEFT_JUSTIFY {
                return Err(FormatError::IllegalFlags {
                    flags: self.flags.to_string(),
                });
            }
            return self.require_width_for_left_justify();
        }
        if self.width != -1 {
            return Err(FormatError::IllegalWidth { width: self.width });
        }
        if !self.flags.is_empty() {
            return Err(FormatError::IllegalFlags {
                flags: self.flags.to_string(),
            });
        }
        Ok(())
    }

    fn require_width_for_left_justify(&self) -> Result<(), FormatError> {
        if self.width == -1 && self.flags.contains(Flags::LEFT_JUSTIFY) {
            return Err(self.missing_width());
        }
        Ok(())
    }

    fn check_bad_flags(&self, bad: &[Flags]) -> Result<(), FormatError> {
        match bad.iter().find(|flag| self.flags.contains(**flag)) {
            Some(flag) => Err(self.mismatch(*flag)),
            None => Ok(()),
        }
    }

    fn mismatch(&self, flag: Flags) -> FormatError {
        FormatError::FlagsConversionMismatch {
            conversion: self.conversion,
            flags: flag.to_string(),
        }
    }

    fn missing_width(&self) -> FormatError {
        FormatError::MissingWidth {
            specifier: self.to_string(),
        }
    }

    fn illegal_precision(&self) -> FormatError {
        FormatError::IllegalPrecision {
            precision: self.precision,
        }
    }

    fn illegal_conversion(&self, argument: &SampleValue) -> FormatError {
        FormatError::IllegalConversion {
            conversion: self.conversion,
            argument_class: argument.class_name().to_string(),
        }
    }

    /// Checks performed while printing `argument` with this specifier.
    fn check_argument(&self, argument: &SampleValue) -> Result<(), FormatError> {
        if self.date_time {
            return self.check_date_time_argument(argument);
        }
        match self.conversion {
            'd' | 'o' | 'x' => self.check_integer_argument(argument),
            'e' | 'f' | 'g' | 'a' => self.check_float_argument(argument),
            'c' => self.check_character_argument(argument),
            's' if self.flags.contains(Flags::ALTERNATE) => Err(self.mismatch(Flags::ALTERNATE)),
            _ => Ok(()),
        }
    }

    fn check_integer_argument(&self, argument: &SampleValue) -> Result<(), FormatError> {
        match argument {
            SampleValue::Null | SampleValue::BigInteger => Ok(()),
            SampleValue::Byte(_)
            | SampleValue::Short(_)
            | SampleValue::Int(_)
            | SampleValue::Long(_) => {
                if self.conversion == 'd' {
                    Ok(())
                } else {
                    self.check_bad_flags(&[Flags::PARENTHESES, Flags::LEADING_SPACE, Flags::PLUS])
                }
            }
            other => Err(self.illegal_conversion(other)),
        }
    }

    fn check_float_argument(&self, argument: &SampleValue) -> Result<(), FormatError> {
        match argument {
            SampleValue::Null | SampleValue::Float(_) | SampleValue::Double(_) => Ok(()),
            SampleValue::BigDecimal if self.conversion != 'a' => Ok(()),
            other => Err(self.illegal_conversion(other)),
        }
    }

    fn check_character_argument(&self, argument: &SampleValue) -> Result<(), FormatError> {
        let code_point = match argument {
            SampleValue::Null | SampleValue::Char(_) => return Ok(()),
            SampleValue::Byte(value) => i32::from(*value),
            SampleValue::Short(value) => i32::from(*value),
            SampleValue::Int(value) => *value,
            other => return Err(self.illegal_conversion(other)),
        };
        if (0..=0x10FFFF).contains(&code_point) {
            Ok(())
        } else {
            Err(FormatError::IllegalCodePoint { code_point })
        }
    }

    fn check_date_time_argument(&self, argument: &SampleValue) -> Result<(), FormatError> {
        match argument {
            SampleValue::Null | SampleValue::Long(_) | SampleValue::Date | SampleValue::Calendar => {
                Ok(())
            }
            SampleValue::LocalDateTime
                if !UNSUPPORTED_BY_LOCAL_DATE_TIME.contains(self.conversion) =>
            {
                Ok(())
            }
            other => Err(self.illegal_conversion(other)),
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uppercase = self.flags.contains(Flags::UPPERCASE);
        write!(f, "%{}", self.flags.without(Flags::UPPERCASE))?;
        if self.index > 0 {
            write!(f, "{}$", self.index)?;
        }
        if self.width != -1 {
            write!(f, "{}", self.width)?;
        }
        if self.precision != -1 {
            write!(f, ".{}", self.precision)?;
        }
        if self.date_time {
            f.write_str(if uppercase { "T" } else { "t" })?;
        }
        if uppercase {
            write!(f, "{}", self.conversion.to_ascii_uppercase())
        } else {
            write!(f, "{}", self.conversion)
        }
    }
}

fn parse(format: &str) -> Result<Vec<Specifier>, FormatError> {
    let chars: Vec<char> = format.chars().collect();
    let mut specifiers = Vec::new();
    let mut position = 0;
    while position < chars.len() {
        if chars[position] != '%' {
            position += 1;
            continue;
        }
        let start = position + 1;
        let Some(&first) = chars.get(start) else {
            return Err(FormatError::UnknownConversion {
                conversion: "%".to_string(),
            });
        };
        let Some(raw) = match_specifier(&chars, start) else {
            return Err(FormatError::UnknownConversion {
                conversion: first.to_string(),
            });
        };
        specifiers.push(Specifier::new(&raw)?);
        position = raw.end;
    }
    Ok(specifiers)
}

/// Simulates `String.format(format, arguments)` without rendering anything.
///
/// The whole format string is parsed before any argument is looked at, so a
/// malformed specifier late in the string wins over a missing argument early on.
pub(crate) fn check_format(format: &str, arguments: &[SampleValue]) -> Result<(), FormatError> {
    let specifiers = parse(format)?;
    let mut last: i32 = -1;
    let mut last_ordinary: i32 = -1;
    for specifier in &specifiers {
        let position = match specifier.index {
            NO_ARGUMENT => continue,
            PREVIOUS_ARGUMENT => last,
            NEXT_ARGUMENT => {
                last_ordinary += 1;
                last = last_ordinary;
                last
            }
            explicit => {
                last = explicit - 1;
                last
            }
        };
        let argument = usize::try_from(position)
            .ok()
            .and_then(|position| arguments.get(position))
            .ok_or_else(|| FormatError::MissingArgument {
                specifier: specifier.to_string(),
            })?;
        specifier.check_argument(argument)?;
    }
    Ok(())
}
