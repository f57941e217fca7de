//! Built-in unit table and unit-expression parser.

use super::{
    rational_from_f64, Dimension, Unit, UnitError, UnitSystem, AMOUNT, CURRENT, LENGTH,
    LUMINOSITY, MASS, TEMPERATURE, TIME,
};
use num_rational::Rational32;
use std::collections::HashMap;
use std::f64::consts::PI;

struct UnitDef {
    symbol: &'static str,
    aliases: &'static [&'static str],
    exponents: [i32; 7],
    scale: f64,
    offset: f64,
    /// Accepts SI prefixes (`km`, `ms`, `kilogram`).
    prefixable: bool,
}

const fn def(
    symbol: &'static str,
    aliases: &'static [&'static str],
    exponents: [i32; 7],
    scale: f64,
    prefixable: bool,
) -> UnitDef {
    UnitDef {
        symbol,
        aliases,
        exponents,
        scale,
        offset: 0.0,
        prefixable,
    }
}

const fn dims(pairs: &[(usize, i32)]) -> [i32; 7] {
    let mut out = [0; 7];
    let mut i = 0;
    while i < pairs.len() {
        out[pairs[i].0] = pairs[i].1;
        i += 1;
    }
    out
}

const NONE: [i32; 7] = [0; 7];

static UNITS: &[UnitDef] = &[
    // SI base units
    def("m", &["meter", "metre"], dims(&[(LENGTH, 1)]), 1.0, true),
    def("g", &["gram", "gramme"], dims(&[(MASS, 1)]), 1e-3, true),
    def("s", &["second", "sec"], dims(&[(TIME, 1)]), 1.0, true),
    def("A", &["ampere", "amp"], dims(&[(CURRENT, 1)]), 1.0, true),
    def("K", &["kelvin"], dims(&[(TEMPERATURE, 1)]), 1.0, true),
    def("mol", &["mole"], dims(&[(AMOUNT, 1)]), 1.0, true),
    def("cd", &["candela"], dims(&[(LUMINOSITY, 1)]), 1.0, true),
    // Length
    def("in", &["inch"], dims(&[(LENGTH, 1)]), 0.0254, false),
    def("ft", &["foot", "feet"], dims(&[(LENGTH, 1)]), 0.3048, false),
    def("yd", &["yard"], dims(&[(LENGTH, 1)]), 0.9144, false),
    def("mi", &["mile"], dims(&[(LENGTH, 1)]), 1609.344, false),
    def("nmi", &["nautical_mile"], dims(&[(LENGTH, 1)]), 1852.0, false),
    // Time
    def("min", &["minute"], dims(&[(TIME, 1)]), 60.0, false),
    def("h", &["hour", "hr"], dims(&[(TIME, 1)]), 3600.0, false),
    def("day", &["d"], dims(&[(TIME, 1)]), 86_400.0, false),
    def("week", &["wk"], dims(&[(TIME, 1)]), 604_800.0, false),
    def("year", &["yr", "a"], dims(&[(TIME, 1)]), 31_557_600.0, false),
    // Mass
    def("lb", &["pound"], dims(&[(MASS, 1)]), 0.453_592_37, false),
    def("oz", &["ounce"], dims(&[(MASS, 1)]), 0.028_349_523_125, false),
    def("t", &["tonne"], dims(&[(MASS, 1)]), 1000.0, false),
    // Volume
    def("L", &["l", "liter", "litre"], dims(&[(LENGTH, 3)]), 1e-3, true),
    // Derived SI
    def("Hz", &["hertz"], dims(&[(TIME, -1)]), 1.0, true),
    def("N", &["newton"], dims(&[(MASS, 1), (LENGTH, 1), (TIME, -2)]), 1.0, true),
    def("J", &["joule"], dims(&[(MASS, 1), (LENGTH, 2), (TIME, -2)]), 1.0, true),
    def("W", &["watt"], dims(&[(MASS, 1), (LENGTH, 2), (TIME, -3)]), 1.0, true),
    def("Pa", &["pascal"], dims(&[(MASS, 1), (LENGTH, -1), (TIME, -2)]), 1.0, true),
    def("bar", &[], dims(&[(MASS, 1), (LENGTH, -1), (TIME, -2)]), 1e5, false),
    def("C", &["coulomb"], dims(&[(TIME, 1), (CURRENT, 1)]), 1.0, true),
    def(
        "V",
        &["volt"],
        dims(&[(MASS, 1), (LENGTH, 2), (TIME, -3), (CURRENT, -1)]),
        1.0,
        true,
    ),
    def(
        "ohm",
        &[],
        dims(&[(MASS, 1), (LENGTH, 2), (TIME, -3), (CURRENT, -2)]),
        1.0,
        true,
    ),
    // Dimensionless ratios and angles
    def("rad", &["radian"], NONE, 1.0, false),
    def("deg", &["degree"], NONE, PI / 180.0, false),
    def("percent", &[], NONE, 0.01, false),
    // Temperatures with offsets
    UnitDef {
        symbol: "degC",
        aliases: &["celsius", "degree_Celsius"],
        exponents: dims(&[(TEMPERATURE, 1)]),
        scale: 1.0,
        offset: 273.15,
        prefixable: false,
    },
    UnitDef {
        symbol: "degF",
        aliases: &["fahrenheit", "degree_Fahrenheit"],
        exponents: dims(&[(TEMPERATURE, 1)]),
        scale: 5.0 / 9.0,
        offset: 273.15 - 32.0 * 5.0 / 9.0,
        prefixable: false,
    },
];

/// (short, long, factor)
static PREFIXES: &[(&str, &str, f64)] = &[
    ("G", "giga", 1e9),
    ("M", "mega", 1e6),
    ("k", "kilo", 1e3),
    ("h", "hecto", 1e2),
    ("d", "deci", 1e-1),
    ("c", "centi", 1e-2),
    ("m", "milli", 1e-3),
    ("u", "micro", 1e-6),
    ("n", "nano", 1e-9),
];

/// The built-in [`UnitSystem`]: SI, common imperial and time units, SI
/// prefixes, and a small unit-expression grammar.
pub struct UnitRegistry {
    by_name: HashMap<&'static str, &'static UnitDef>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        for unit in UNITS {
            by_name.insert(unit.symbol, unit);
            for alias in unit.aliases {
                by_name.insert(*alias, unit);
            }
        }
        Self { by_name }
    }

    /// Look up a single unit name (no operators).
    pub fn lookup(&self, name: &str) -> Result<Unit, UnitError> {
        if name == "dimensionless" {
            return Ok(Unit::dimensionless());
        }
        if let Some(unit) = self.exact(name) {
            return Ok(unit);
        }
        // Plurals: meters, inches, minutes
        for suffix in ["s", "es"] {
            if let Some(stem) = name.strip_suffix(suffix) {
                if stem.len() > 2 {
                    if let Some(unit) = self.exact(stem) {
                        return Ok(unit);
                    }
                }
            }
        }
        Err(UnitError::UnknownUnit(name.to_string()))
    }

    fn exact(&self, name: &str) -> Option<Unit> {
        if let Some(def) = self.by_name.get(name) {
            return Some(to_unit(def, def.symbol, 1.0));
        }
        for (short, long, factor) in PREFIXES {
            // kilometer -> km, km -> km
            let candidates = [(*long, true), (*short, false)];
            for (prefix, is_long) in candidates {
                let Some(rest) = name.strip_prefix(prefix) else {
                    continue;
                };
                let Some(def) = self.by_name.get(rest) else {
                    continue;
                };
                // Long prefixes go with long names, short with symbols.
                if !def.prefixable || is_long == (rest == def.symbol) {
                    continue;
                }
                let symbol = format!("{}{}", short, def.symbol);
                return Some(to_unit(def, &symbol, *factor));
            }
        }
        None
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitSystem for UnitRegistry {
    fn parse(&self, text: &str) -> Result<Unit, UnitError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Unit::dimensionless());
        }
        let mut parser = UnitParser {
            registry: self,
            text: trimmed,
            chars: trimmed.char_indices().collect(),
            pos: 0,
            nesting: 0,
        };
        let unit = parser.parse_product()?;
        parser.skip_whitespace();
        if parser.pos < parser.chars.len() {
            return Err(parser.error(format!(
                "unexpected '{}'",
                parser.chars[parser.pos].1
            )));
        }
        Ok(unit)
    }
}

fn to_unit(def: &UnitDef, symbol: &str, prefix: f64) -> Unit {
    Unit::named(
        symbol,
        Dimension::from_exponents(def.exponents),
        def.scale * prefix,
        def.offset,
    )
}

/// Deepest parenthesis nesting accepted in a unit expression.
const MAX_UNIT_NESTING: usize = 32;

/// Recursive descent over `product := power (('*' | '/') power)*`.
struct UnitParser<'a> {
    registry: &'a UnitRegistry,
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    nesting: usize,
}

impl<'a> UnitParser<'a> {
    fn error(&self, message: String) -> UnitError {
        UnitError::Malformed {
            text: self.text.to_string(),
            message,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_power_operator(&mut self) -> bool {
        self.skip_whitespace();
        if self.peek() == Some('^') {
            self.pos += 1;
            return true;
        }
        if self.peek() == Some('*') && self.chars.get(self.pos + 1).map(|(_, c)| *c) == Some('*') {
            self.pos += 2;
            return true;
        }
        false
    }

    fn parse_product(&mut self) -> Result<Unit, UnitError> {
        let mut unit = self.parse_power()?;
        loop {
            self.skip_whitespace();
            let is_pow = self.peek() == Some('*')
                && self.chars.get(self.pos + 1).map(|(_, c)| *c) == Some('*');
            if !is_pow && self.eat('*') {
                let rhs = self.parse_power()?;
                unit = self.registry.multiply(&unit, &rhs)?;
            } else if self.eat('/') {
                let rhs = self.parse_power()?;
                unit = self.registry.divide(&unit, &rhs)?;
            } else {
                return Ok(unit);
            }
        }
    }

    fn parse_power(&mut self) -> Result<Unit, UnitError> {
        let base = self.parse_atom()?;
        if self.eat_power_operator() {
            let exponent = self.parse_exponent()?;
            return self.registry.power(&base, exponent);
        }
        Ok(base)
    }

    fn parse_exponent(&mut self) -> Result<Rational32, UnitError> {
        if self.eat('(') {
            let numer = self.parse_signed_number()?;
            let value = if self.eat('/') {
                let denom = self.parse_signed_number()?;
                if denom == 0.0 {
                    return Err(self.error("zero denominator in exponent".to_string()));
                }
                numer / denom
            } else {
                numer
            };
            if !self.eat(')') {
                return Err(self.error("expected ')' after exponent".to_string()));
            }
            return rational_from_f64(value)
                .ok_or_else(|| self.error(format!("exponent {} is not a simple fraction", value)));
        }
        let value = self.parse_signed_number()?;
        rational_from_f64(value)
            .ok_or_else(|| self.error(format!("exponent {} is not a simple fraction", value)))
    }

    fn parse_signed_number(&mut self) -> Result<f64, UnitError> {
        let negative = self.eat('-');
        self.skip_whitespace();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        let value: f64 = literal
            .parse()
            .map_err(|_| self.error("expected a number".to_string()))?;
        Ok(if negative { -value } else { value })
    }

    fn parse_atom(&mut self) -> Result<Unit, UnitError> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                self.nesting += 1;
                if self.nesting > MAX_UNIT_NESTING {
                    return Err(self.error(format!(
                        "parentheses nested deeper than {}",
                        MAX_UNIT_NESTING
                    )));
                }
                let inner = self.parse_product()?;
                self.nesting -= 1;
                if !self.eat(')') {
                    return Err(self.error("expected ')'".to_string()));
                }
                Ok(inner)
            }
            Some('1') => {
                self.pos += 1;
                Ok(Unit::dimensionless())
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                    self.pos += 1;
                }
                let name: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
                self.registry.lookup(&name)
            }
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("unexpected end of unit expression".to_string())),
        }
    }
}
