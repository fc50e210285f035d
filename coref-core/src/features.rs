//! # Features Brutas de um Token
//!
//! O analisador sintático-semântico entrega cada token como uma lista plana de
//! campos `Chave=Valor` (a ordem não importa):
//!
//! ```text
//! Offset=12   Text=ток-шоу   ParentOffset=4   SC=TV_SHOW(4021)   SurfSlot=$Object(88)   SP=Noun(7)
//! ```
//!
//! Este módulo guarda esses pares num mapa ([`RawFeatures`]) e oferece os dois
//! utilitários de consulta que o resto do pipeline usa:
//!
//! - [`find_feature_value`]: busca tolerante por chave, direto nos campos brutos.
//! - [`extract_id`]: o identificador numérico entre parênteses de um valor
//!   (`"TV_SHOW(4021)"` → `"4021"`), usado na exportação do dataset.
//!
//! Uma chave ausente **não** é erro: as funções devolvem `None` e quem chama
//! decide o padrão (string vazia, `"0"`, sentinela...).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Chaves conhecidas do formato `Chave=Valor`.
pub mod keys {
    pub const OFFSET: &str = "Offset";
    pub const PARENT_OFFSET: &str = "ParentOffset";
    pub const TEXT: &str = "Text";
    pub const SEMANTIC_CLASS: &str = "SC";
    pub const SEMANTIC_SLOT: &str = "SemSlot";
    pub const SURFACE_SLOT: &str = "SurfSlot";
    pub const SYNTAX_PARADIGM: &str = "SP";
    pub const LEMMA: &str = "lemma";
    pub const MORPHOLOGY: &str = "gram";
}

/// Mapa esparso de features brutas de um token.
///
/// Usamos `BTreeMap` para que a serialização seja estável (útil para comparar
/// saídas entre execuções).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeatures {
    pub values: BTreeMap<String, String>,
}

impl RawFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrói o mapa a partir de campos `Chave=Valor`.
    ///
    /// Campos sem `=` são ignorados; o valor é tudo o que vem depois do primeiro `=`.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut features = Self::new();
        for field in fields {
            if let Some((key, value)) = field.trim().split_once('=') {
                features.insert(key.trim(), value.trim());
            }
        }
        features
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Valor de uma chave; valores vazios contam como ausentes.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Valor como inteiro, quando presente e numérico.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Procura o primeiro campo que *contém* `key` e devolve o que vem depois do `=`.
///
/// É a busca "por prefixo" do formato bruto: `find_feature_value("Offset=", ...)`
/// casa com o campo `Offset=12`. Cuidado com chaves que são sufixo de outras
/// (`Offset=` também está dentro de `ParentOffset=`); por isso o chamador passa a
/// chave com o `=` e a ordem dos campos importa.
///
/// ```rust
/// use coref_core::features::find_feature_value;
///
/// let fields = ["Offset=12", "Text=ток-шоу"];
/// assert_eq!(find_feature_value("Text=", &fields), Some("ток-шоу"));
/// assert_eq!(find_feature_value("SC=", &fields).unwrap_or("0"), "0");
/// ```
pub fn find_feature_value<'a, S: AsRef<str>>(key: &str, fields: &'a [S]) -> Option<&'a str> {
    fields
        .iter()
        .map(AsRef::as_ref)
        .find(|field| field.contains(key))
        .and_then(|field| field.split_once('='))
        .map(|(_, value)| value)
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([0-9]+)\)").expect("padrão de id válido"))
}

/// Extrai o id numérico entre parênteses de um valor de feature.
///
/// `"TV_SHOW(4021)"` → `Some("4021")`; sem parênteses numéricos → `None`.
pub fn extract_id(value: &str) -> Option<&str> {
    id_pattern()
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
