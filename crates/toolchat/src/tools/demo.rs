//! Demo capabilities used by the `toolchat` binary.
//!
//! These are simulated leaf tools: the weather table and search results are
//! canned. They exist to exercise the turn loop end to end.

use crate::error::ToolError;
use crate::tools::core::{FnTool, ToolRegistry};
use crate::tools::spec::ToolSpec;
use schemars::JsonSchema;
use serde::Deserialize;

/// Arguments for `get_weather`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// City name (e.g., Delhi, Mumbai).
    pub location: String,
}

/// Arguments for `calculate`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CalculateArgs {
    /// Arithmetic expression using digits, + - * / ( ) and spaces.
    pub expression: String,
}

/// Arguments for `get_current_time`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TimeArgs {
    /// "UTC" (default) or "local".
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Arguments for `search_information`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// What to search for.
    pub query: String,
}

const WEATHER_TABLE: &[(&str, &str)] = &[
    ("delhi", "Sunny, 28°C"),
    ("mumbai", "Partly cloudy, 32°C"),
    ("bangalore", "Rainy, 22°C"),
    ("chennai", "Hot, 35°C"),
];

/// Canned weather lookup; cities are matched as substrings, case-insensitively.
pub fn get_weather(location: &str) -> String {
    let location = location.to_lowercase();
    WEATHER_TABLE
        .iter()
        .find(|(city, _)| location.contains(city))
        .map_or("Sunny, 25°C (Simulated)", |&(_, report)| report)
        .to_string()
}

/// Evaluate an arithmetic expression.
pub fn calculate(expression: &str) -> Result<String, ToolError> {
    const ALLOWED: &str = "0123456789+-*/(). ";
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(ToolError::failed("Invalid characters in expression"));
    }
    let value = Parser::new(expression).parse()?;
    if !value.is_finite() {
        return Err(ToolError::failed("Result is too large"));
    }
    Ok(format_number(value))
}

/// Current time as `YYYY-MM-DD HH:MM:SS`.
pub fn get_current_time(timezone: Option<&str>) -> Result<String, ToolError> {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    match timezone.map(str::trim) {
        None | Some("") => Ok(format!("{} UTC", chrono::Utc::now().format(FORMAT))),
        Some(tz) if tz.eq_ignore_ascii_case("utc") => {
            Ok(format!("{} UTC", chrono::Utc::now().format(FORMAT)))
        }
        Some(tz) if tz.eq_ignore_ascii_case("local") => {
            Ok(chrono::Local::now().format(FORMAT).to_string())
        }
        Some(tz) => Err(ToolError::failed(format!(
            "unsupported timezone '{tz}'; use UTC or local"
        ))),
    }
}

/// Simulated web search.
pub fn search_information(query: &str) -> String {
    format!("Search results for '{query}': [Simulated web search]")
}

/// Register all demo tools.
pub fn register_demo_tools(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(
        ToolSpec::builder("get_weather")
            .description("Get current weather for a city")
            .parameters_for::<WeatherArgs>()
            .build(),
        FnTool::from_sync(|args: WeatherArgs| Ok(get_weather(&args.location))),
    )?;
    registry.register(
        ToolSpec::builder("calculate")
            .description("Evaluate a mathematical expression")
            .parameters_for::<CalculateArgs>()
            .example("(12 + 8) * 3", "60")
            .build(),
        FnTool::from_sync(|args: CalculateArgs| calculate(&args.expression)),
    )?;
    registry.register(
        ToolSpec::builder("get_current_time")
            .description("Get the current date and time")
            .parameters_for::<TimeArgs>()
            .build(),
        FnTool::from_sync(|args: TimeArgs| get_current_time(args.timezone.as_deref())),
    )?;
    registry.register(
        ToolSpec::builder("search_information")
            .description("Search the web for information")
            .parameters_for::<SearchArgs>()
            .build(),
        FnTool::from_sync(|args: SearchArgs| Ok(search_information(&args.query))),
    )?;
    Ok(())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Expression parser ──────────────────────────────────────────────

/// Recursive-descent evaluator:
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/') unary)*
/// unary  := '-' unary | '+' unary | atom
/// atom   := number | '(' expr ')'
/// ```
///
/// Signs and parentheses nest at most [`MAX_NESTING`] deep.
struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    depth: usize,
}

const MAX_NESTING: usize = 64;

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            depth: 0,
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ToolError>,
    ) -> Result<T, ToolError> {
        if self.depth >= MAX_NESTING {
            return Err(ToolError::failed("Expression nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse(mut self) -> Result<f64, ToolError> {
        let value = self.expr()?;
        self.skip_ws();
        match self.chars.next() {
            None => Ok(value),
            Some(c) => Err(ToolError::failed(format!("unexpected '{c}'"))),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.peek().copied()
    }

    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.chars.next();
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.chars.next();
            let rhs = self.unary()?;
            if op == '*' {
                value *= rhs;
            } else if rhs == 0.0 {
                return Err(ToolError::failed("division by zero"));
            } else {
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.nested(Self::unary)?)
            }
            Some('+') => {
                self.chars.next();
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some('(') => {
                self.chars.next();
                let value = self.nested(Self::expr)?;
                match self.peek() {
                    Some(')') => {
                        self.chars.next();
                        Ok(value)
                    }
                    _ => Err(ToolError::failed("missing closing parenthesis")),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
                    literal.push(c);
                }
                literal
                    .parse::<f64>()
                    .map_err(|_| ToolError::failed(format!("invalid number '{literal}'")))
            }
            Some(c) => Err(ToolError::failed(format!("unexpected '{c}'"))),
            None => Err(ToolError::failed("unexpected end of expression")),
        }
    }
}
