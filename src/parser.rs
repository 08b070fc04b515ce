use crate::types::Command;

fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Cursor over one input line, producing whitespace-delimited tokens lazily.
/// A quoted region inside a token is atomic: blanks and `|` between matching
/// `"` or `'` pairs stay literal. An unterminated quote runs to end of line.
#[derive(Clone)]
struct Lexer<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str) -> Lexer<'a> {
        Lexer { line, pos: 0 }
    }

    fn skip_blanks(&mut self) {
        let bytes = self.line.as_bytes();
        while self.pos < bytes.len() && is_blank(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        self.skip_blanks();
        let bytes = self.line.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                c if is_blank(c) => break,
                quote @ (b'"' | b'\'') => {
                    self.pos += 1;
                    while self.pos < bytes.len() && bytes[self.pos] != quote {
                        self.pos += 1;
                    }
                    if self.pos < bytes.len() {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        Some(&self.line[start..self.pos])
    }

    fn peek_token(&self) -> Option<&'a str> {
        self.clone().next_token()
    }
}

/// Strip one layer of quoting from a fully wrapped token.
fn unquote(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() > 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Parse one line into a command chain.
///
/// Trailing `?` marks completion on the head; trailing `&` marks background
/// on the terminal stage. Both are dropped before tokenization.
pub fn parse(line: &str) -> Command {
    let mut text = line.trim_matches(|c| c == ' ' || c == '\t');
    let mut needs_completion = false;
    let mut background = false;
    if let Some(rest) = text.strip_suffix('?') {
        needs_completion = true;
        text = rest.trim_end_matches(|c| c == ' ' || c == '\t');
    }
    if let Some(rest) = text.strip_suffix('&') {
        background = true;
        text = rest.trim_end_matches(|c| c == ' ' || c == '\t');
    }

    let mut lexer = Lexer::new(text);
    let mut command = parse_stage(&mut lexer);
    command.needs_completion = needs_completion;
    if background {
        command.tail_mut().background = true;
    }
    command
}

fn parse_stage(lexer: &mut Lexer) -> Command {
    let mut command = Command::default();
    if let Some(token) = lexer.next_token() {
        command.name = token.to_string();
    }
    while let Some(token) = lexer.next_token() {
        if token == "|" {
            // Everything not yet tokenized belongs to the next stage.
            command.next = Some(Box::new(parse_stage(lexer)));
            break;
        }
        if token == "&" {
            continue; // already handled during trimming
        }
        if let Some(rest) = token.strip_prefix('<') {
            command.redirect_input = Some(redirect_target(rest, lexer));
            continue;
        }
        if let Some(rest) = token.strip_prefix('>') {
            if let Some(rest) = rest.strip_prefix('>') {
                command.redirect_output_append = Some(redirect_target(rest, lexer));
            } else {
                command.redirect_output_truncate = Some(redirect_target(rest, lexer));
            }
            continue;
        }
        command.arguments.push(unquote(token).to_string());
    }
    command
}

/// Target of a redirection operator: the token's own remainder, or the next
/// token when the operator stood alone. A missing target stays the empty
/// string and surfaces later as an I/O error, not a parse error.
fn redirect_target(rest: &str, lexer: &mut Lexer) -> String {
    if !rest.is_empty() {
        return rest.to_string();
    }
    match lexer.peek_token() {
        Some("|") | None => String::new(),
        Some(_) => lexer.next_token().unwrap_or_default().to_string(),
    }
}
