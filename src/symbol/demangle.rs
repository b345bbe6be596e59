// Wed Feb 11 2026 - Alex

/// Parses a GNU/Itanium `type_info` typename (the string a `_ZTI` structure
/// points at, e.g. `1A` or `N3foo3BarE`) into its qualified-name components.
///
/// Only the subset of the mangling grammar that can appear in a class
/// typename is handled; anything else returns `None`.
pub fn type_name_components(typename: &str) -> Option<Vec<String>> {
    let mut parser = TypeNameParser::new(typename);
    let components = parser.parse_name()?;
    if components.is_empty() {
        None
    } else {
        Some(components)
    }
}

/// Human-readable qualified name, `::`-joined.
pub fn demangle_type_name(typename: &str) -> Option<String> {
    type_name_components(typename).map(|c| c.join("::"))
}

/// Best-effort display name for a mangled function symbol. Handles the
/// nested-name forms constructors and destructors are emitted with; returns
/// the input unchanged when it is not mangled or not parseable.
pub fn try_demangle_function(symbol: &str) -> String {
    let stripped = symbol.strip_prefix("__Z").or_else(|| symbol.strip_prefix("_Z"));
    let Some(stripped) = stripped else {
        return symbol.to_string();
    };
    let mut parser = TypeNameParser::new(stripped);
    match parser.parse_name() {
        Some(components) if !components.is_empty() => components.join("::"),
        _ => symbol.to_string(),
    }
}

/// Destructor detection per the ABI's naming convention: the demangled
/// identifier begins with `~`, which corresponds to a `D0`/`D1`/`D2`
/// component in the mangled form.
pub fn is_destructor_name(name: &str) -> bool {
    let display = try_demangle_function(name);
    display
        .rsplit("::")
        .next()
        .map(|last| last.starts_with('~'))
        .unwrap_or(false)
}

struct TypeNameParser<'a> {
    input: &'a [u8],
    pos: usize,
    substitutions: Vec<Vec<String>>,
}

impl<'a> TypeNameParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input: input.as_bytes(), pos: 0, substitutions: Vec::new() }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn parse_name(&mut self) -> Option<Vec<String>> {
        match self.peek()? {
            b'N' => {
                self.advance();
                self.parse_nested_name()
            }
            b'S' => {
                self.advance();
                let mut components = self.parse_substitution()?;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    components.push(self.parse_source_name()?);
                }
                Some(components)
            }
            b'0'..=b'9' => Some(vec![self.parse_source_name()?]),
            _ => None,
        }
    }

    fn parse_nested_name(&mut self) -> Option<Vec<String>> {
        let mut components: Vec<String> = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                b'E' => {
                    self.advance();
                    return Some(components);
                }
                b'0'..=b'9' => {
                    let name = self.parse_source_name()?;
                    components.push(name);
                    self.substitutions.push(components.clone());
                }
                b'S' => {
                    self.advance();
                    let sub = self.parse_substitution()?;
                    components.extend(sub);
                }
                b'C' => {
                    // Constructor: repeats the enclosing class name.
                    self.advance();
                    self.skip_digit();
                    let last = components.last()?.clone();
                    components.push(last);
                }
                b'D' => {
                    self.advance();
                    self.skip_digit();
                    let last = components.last()?.clone();
                    components.push(format!("~{}", last));
                }
                b'I' => {
                    self.advance();
                    let args = self.parse_template_args()?;
                    let last = components.last_mut()?;
                    last.push('<');
                    last.push_str(&args.join(", "));
                    last.push('>');
                    self.substitutions.push(components.clone());
                }
                b'L' => {
                    // Internal-linkage marker carries no name of its own.
                    self.advance();
                }
                _ => return None,
            }
        }
        None
    }

    fn skip_digit(&mut self) {
        if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn parse_source_name(&mut self) -> Option<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let len: usize = std::str::from_utf8(&self.input[start..self.pos]).ok()?.parse().ok()?;
        if len == 0 || self.pos + len > self.input.len() {
            return None;
        }
        let name = std::str::from_utf8(&self.input[self.pos..self.pos + len]).ok()?.to_string();
        self.pos += len;
        Some(name)
    }

    fn parse_substitution(&mut self) -> Option<Vec<String>> {
        match self.peek()? {
            b't' => {
                self.advance();
                Some(vec!["std".to_string()])
            }
            b'a' => {
                self.advance();
                Some(vec!["std".to_string(), "allocator".to_string()])
            }
            b'b' => {
                self.advance();
                Some(vec!["std".to_string(), "basic_string".to_string()])
            }
            b's' => {
                self.advance();
                Some(vec!["std".to_string(), "string".to_string()])
            }
            b'_' => {
                self.advance();
                self.substitutions.first().cloned()
            }
            b'0'..=b'9' | b'A'..=b'Z' => {
                let mut index = 0usize;
                while let Some(c) = self.peek() {
                    if c == b'_' {
                        self.advance();
                        break;
                    }
                    let digit = (c as char).to_digit(36)? as usize;
                    index = index * 36 + digit;
                    self.advance();
                }
                self.substitutions.get(index + 1).cloned()
            }
            _ => None,
        }
    }

    fn parse_template_args(&mut self) -> Option<Vec<String>> {
        let mut args = Vec::new();
        while let Some(c) = self.peek() {
            if c == b'E' {
                self.advance();
                return Some(args);
            }
            args.push(self.parse_type_arg()?);
        }
        None
    }

    fn parse_type_arg(&mut self) -> Option<String> {
        let c = self.peek()?;
        let builtin = match c {
            b'v' => Some("void"),
            b'b' => Some("bool"),
            b'c' => Some("char"),
            b'a' => Some("signed char"),
            b'h' => Some("unsigned char"),
            b's' => Some("short"),
            b't' => Some("unsigned short"),
            b'i' => Some("int"),
            b'j' => Some("unsigned int"),
            b'l' => Some("long"),
            b'm' => Some("unsigned long"),
            b'x' => Some("long long"),
            b'y' => Some("unsigned long long"),
            b'f' => Some("float"),
            b'd' => Some("double"),
            b'w' => Some("wchar_t"),
            _ => None,
        };
        if let Some(name) = builtin {
            self.advance();
            return Some(name.to_string());
        }
        match c {
            b'P' => {
                self.advance();
                Some(format!("{}*", self.parse_type_arg()?))
            }
            b'R' => {
                self.advance();
                Some(format!("{}&", self.parse_type_arg()?))
            }
            b'K' => {
                self.advance();
                Some(format!("const {}", self.parse_type_arg()?))
            }
            b'N' | b'S' | b'0'..=b'9' => Some(self.parse_name()?.join("::")),
            _ => None,
        }
    }
}
