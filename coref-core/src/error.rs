//! # Erros do pipeline de correferência
//!
//! Nem toda falha é um erro. Uma feature ausente numa linha bruta devolve um valor
//! padrão, e um token primário sem par no fluxo secundário apenas fica sem features
//! linguísticas. Só chegam aqui as falhas que invalidam um documento inteiro
//! (árvore de dependências corrompida, token de menção inexistente) ou que
//! impedem a leitura da entrada.
//!
//! Linhas malformadas também não abortam nada: viram [`RowWarning`] e o
//! restante do documento segue normalmente.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alias de `Result` usado em todo o crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Erros fatais para um documento (ou para a leitura da configuração).
#[derive(Error, Debug)]
pub enum Error {
    /// O par `(id, parent_id)` aponta para um pai que não existe entre os nós.
    #[error("nó {id} aponta para o pai {parent_id}, que não existe no documento")]
    OrphanParent { id: i64, parent_id: i64 },

    /// Nós que não são alcançáveis a partir de nenhuma raiz (ciclo nos pais).
    #[error("dependências cíclicas envolvendo os nós {ids:?}")]
    CyclicDependency { ids: Vec<i64> },

    /// Um id de menção não tem registro correspondente (sem forma de palavra).
    #[error("token {id} não encontrado entre os registros do documento")]
    MissingToken { id: i64 },

    #[error("configuração inválida: {0}")]
    Config(String),

    #[error("erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("erro de JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Aviso emitido para uma linha ignorada durante a leitura de um documento.
///
/// O número da linha é relativo ao bloco lido (começando em 1), o que basta
/// para localizar o problema no arquivo de origem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowWarning {
    pub line: usize,
    pub reason: String,
}

impl RowWarning {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RowWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "linha {}: {}", self.line, self.reason)
    }
}
