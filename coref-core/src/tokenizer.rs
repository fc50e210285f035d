//! # Tokens e Normalização de Formas de Palavra
//!
//! Os dois analisadores que alimentam o pipeline tokenizam o mesmo texto de formas
//! diferentes. Aqui ficam a unidade comum que o alinhador enxerga ([`Token`]:
//! texto + offset) e as funções de comparação que tornam as duas tokenizações
//! comparáveis.
//!
//! ## Normalização
//!
//! - **NFC**: alguns arquivos trazem "й" decomposto (`и` + U+0306). Sem normalizar,
//!   "мой" de um lado nunca é igual a "мой" do outro.
//! - **Chave de comparação**: espaços são ignorados, porque um analisador pode
//!   gerar o token único "так что" onde o outro gera "так" e "что".
//!
//! ## Tokenização de demonstração
//!
//! [`tokenize_with_mode`] não substitui nenhum dos analisadores reais. Ela existe
//! para gerar rapidamente dois fluxos discordantes do mesmo texto (com e sem
//! separação de hífens), útil na interface web e nos testes.
//!
//! ```rust
//! use coref_core::tokenizer::{tokenize_with_mode, TokenizerMode};
//!
//! let whole = tokenize_with_mode("Это ток-шоу.", TokenizerMode::Standard);
//! let split = tokenize_with_mode("Это ток-шоу.", TokenizerMode::SplitHyphens);
//! assert_eq!(whole.len(), 3);
//! assert_eq!(split.len(), 5);
//! ```

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Um token de um dos fluxos de anotação.
///
/// O `offset` é a posição (em caracteres) do primeiro caractere do token no texto
/// de origem compartilhado. Só é único dentro do fluxo que o produziu.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub offset: i64,
}

impl Token {
    pub fn new(text: impl Into<String>, offset: i64) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }

    /// Offset logo após o último caractere do token.
    pub fn end(&self) -> i64 {
        self.offset + self.text.chars().count() as i64
    }
}

impl AsRef<Token> for Token {
    fn as_ref(&self) -> &Token {
        self
    }
}

/// Estratégias de tokenização de demonstração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    /// Palavras com hífen ficam inteiras ("ток-шоу").
    Standard,
    /// Palavras com hífen são quebradas em partes e o hífen vira token próprio
    /// ("ток", "-", "шоу"), como faz um dos analisadores.
    SplitHyphens,
}

impl Default for TokenizerMode {
    fn default() -> Self {
        TokenizerMode::Standard
    }
}

/// Normaliza uma forma de palavra para NFC.
pub fn normalize_wordform(text: &str) -> String {
    text.nfc().collect()
}

/// `true` quando o token é composto apenas de pontuação/símbolos.
///
/// Tokens vazios não são pontuação.
pub fn is_punctuation(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

/// Chave usada para comparar pedaços concatenados: o texto sem espaços.
pub fn comparison_key(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Remove os `n` primeiros grafemas de `text`.
///
/// Se o texto tiver menos de `n` grafemas, devolve uma string vazia.
pub fn strip_graphemes(text: &str, n: usize) -> &str {
    match text.grapheme_indices(true).nth(n) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => "",
    }
}

/// Tokeniza usando o modo padrão.
pub fn tokenize(text: &str) -> Vec<Token> {
    tokenize_with_mode(text, TokenizerMode::Standard)
}

/// Tokeniza o texto, calculando offsets em caracteres.
pub fn tokenize_with_mode(text: &str, mode: TokenizerMode) -> Vec<Token> {
    let standard = tokenize_standard(text);
    match mode {
        TokenizerMode::Standard => standard,
        TokenizerMode::SplitHyphens => standard.into_iter().flat_map(split_hyphens).collect(),
    }
}

fn tokenize_standard(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_start = 0i64;

    let chars: Vec<char> = text.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        let pos = i as i64;
        // hífen interno ("ток-шоу") continua a palavra
        let inner_hyphen = ch == '-'
            && !current.is_empty()
            && chars.get(i + 1).map(|c| c.is_alphanumeric()).unwrap_or(false);

        if ch.is_alphanumeric() || inner_hyphen {
            if current.is_empty() {
                current_start = pos;
            }
            current.push(ch);
        } else {
            flush_token(&mut tokens, &mut current, current_start);
            if !ch.is_whitespace() {
                tokens.push(Token::new(ch.to_string(), pos));
            }
        }
    }
    flush_token(&mut tokens, &mut current, current_start);
    tokens
}

fn split_hyphens(token: Token) -> Vec<Token> {
    if !token.text.contains('-') || is_punctuation(&token.text) {
        return vec![token];
    }
    let mut pieces = Vec::new();
    let mut offset = token.offset;
    for (i, part) in token.text.split('-').enumerate() {
        if i > 0 {
            pieces.push(Token::new("-", offset));
            offset += 1;
        }
        if !part.is_empty() {
            pieces.push(Token::new(part, offset));
            offset += part.chars().count() as i64;
        }
    }
    pieces
}

fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: i64) {
    if !text.is_empty() {
        tokens.push(Token::new(text.clone(), start));
        text.clear();
    }
}
