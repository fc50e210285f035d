//! # Formatos de Linha dos Corpora
//!
//! Leitores para as tabelas de onde vêm os dois fluxos de tokens, os grupos de
//! correferência e as menções de referência. Todos seguem a mesma regra: uma
//! linha ruim vira um [`RowWarning`] e a leitura continua.
//!
//! | Formato               | Separador | Colunas                                                          |
//! |-----------------------|-----------|------------------------------------------------------------------|
//! | NLC (analisador)      | tab       | `Chave=Valor` em qualquer ordem; sentenças separadas por linha vazia |
//! | RuCor tokens          | tab       | `doc_id shift length token lemma gram`                           |
//! | RuCor grupos          | tab       | `doc_id variant group_id chain_id link shift length content tk_shifts` |
//! | OpenCorpora tokens    | espaço    | `token_id start length token`                                    |
//! | Menções de referência | tab       | `chain_id mention`                                               |
//!
//! Linhas de cabeçalho (começando por `doc_id`) e linhas vazias são ignoradas.
//! Números de linha nos avisos começam em 1.
//!
//! O módulo também traz um documento de demonstração completo, usado pela
//! interface web e pelos testes de integração do pipeline.

use std::collections::HashMap;

use tracing::warn;

use crate::error::RowWarning;
use crate::features::{keys, RawFeatures};
use crate::merge::{parse_offset_list, CorefGroup};
use crate::pipeline::Document;
use crate::record::TokenAnnotation;
use crate::tokenizer::Token;

/// Linhas de dados com seu número (1-based), sem cabeçalho nem linhas vazias.
fn data_lines(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with("doc_id"))
}

fn log_warnings(source: &str, warnings: &[RowWarning]) {
    for w in warnings {
        warn!(source, line = w.line, reason = %w.reason, "linha ignorada");
    }
}

/// Lê a saída do analisador sintático-semântico.
///
/// Cada linha é um token; `Offset=` e `Text=` são obrigatórios. Uma linha vazia
/// fecha a sentença corrente.
pub fn parse_nlc(raw: &str) -> (Vec<Vec<TokenAnnotation>>, Vec<RowWarning>) {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    let mut warnings = Vec::new();

    for (i, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        let features = RawFeatures::from_fields(line.split('\t'));
        let Some(offset) = features.get_i64(keys::OFFSET) else {
            warnings.push(RowWarning::new(i + 1, "sem `Offset=` numérico"));
            continue;
        };
        let Some(text) = features.get(keys::TEXT).map(str::to_string) else {
            warnings.push(RowWarning::new(i + 1, "sem `Text=`"));
            continue;
        };
        current.push(TokenAnnotation {
            token: Token::new(text, offset),
            features,
        });
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    log_warnings("nlc", &warnings);
    (sentences, warnings)
}

/// Lê a tabela de tokens do RuCor. Lema e morfologia são opcionais.
pub fn parse_rucor_tokens(raw: &str) -> (Vec<(String, TokenAnnotation)>, Vec<RowWarning>) {
    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    for (line_no, line) in data_lines(raw) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 4 {
            warnings.push(RowWarning::new(line_no, format!("esperadas ao menos 4 colunas, há {}", cols.len())));
            continue;
        }
        let Ok(offset) = cols[1].trim().parse::<i64>() else {
            warnings.push(RowWarning::new(line_no, format!("shift inválido `{}`", cols[1])));
            continue;
        };
        let mut annotation = TokenAnnotation::new(cols[3], offset);
        if let Some(lemma) = cols.get(4).filter(|v| !v.is_empty()) {
            annotation.features.insert(keys::LEMMA, *lemma);
        }
        if let Some(gram) = cols.get(5).filter(|v| !v.is_empty()) {
            annotation.features.insert(keys::MORPHOLOGY, *gram);
        }
        rows.push((cols[0].to_string(), annotation));
    }

    log_warnings("rucor_tokens", &warnings);
    (rows, warnings)
}

/// Lê a tabela de grupos do RuCor. `tk_shifts` é a lista de offsets cobertos.
pub fn parse_rucor_groups(raw: &str) -> (Vec<(String, CorefGroup)>, Vec<RowWarning>) {
    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    for (line_no, line) in data_lines(raw) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 9 {
            warnings.push(RowWarning::new(line_no, format!("esperadas 9 colunas, há {}", cols.len())));
            continue;
        }
        let offsets = match parse_offset_list(cols[8]) {
            Ok(offsets) if !offsets.is_empty() => offsets,
            Ok(_) => {
                warnings.push(RowWarning::new(line_no, "tk_shifts vazio"));
                continue;
            }
            Err(reason) => {
                warnings.push(RowWarning::new(line_no, reason));
                continue;
            }
        };
        let mut group = CorefGroup::new(cols[2], cols[3], cols[4], offsets);
        group.content = Some(cols[7].to_string()).filter(|c| !c.is_empty());
        rows.push((cols[0].to_string(), group));
    }

    log_warnings("rucor_groups", &warnings);
    (rows, warnings)
}

/// Lê tokens no formato do OpenCorpora (`id início comprimento token`).
///
/// A forma de palavra é o restante da linha depois da terceira coluna.
pub fn parse_opencorpora_tokens(raw: &str) -> (Vec<TokenAnnotation>, Vec<RowWarning>) {
    let mut tokens = Vec::new();
    let mut warnings = Vec::new();

    for (line_no, line) in data_lines(raw) {
        let cols: Vec<&str> = line.trim().splitn(4, ' ').collect();
        if cols.len() < 4 || cols[3].is_empty() {
            warnings.push(RowWarning::new(line_no, "esperado `id início comprimento token`"));
            continue;
        }
        match cols[1].parse::<i64>() {
            Ok(offset) => tokens.push(TokenAnnotation::new(cols[3], offset)),
            Err(_) => warnings.push(RowWarning::new(line_no, format!("início inválido `{}`", cols[1]))),
        }
    }

    log_warnings("opencorpora", &warnings);
    (tokens, warnings)
}

/// Lê a tabela de menções de referência (`cadeia<TAB>menção`).
pub fn parse_gold_mentions(raw: &str) -> (Vec<(String, String)>, Vec<RowWarning>) {
    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    for (line_no, line) in data_lines(raw) {
        match line.split_once('\t') {
            Some((chain, mention)) if !chain.trim().is_empty() && !mention.trim().is_empty() => {
                rows.push((chain.trim().to_string(), mention.trim().to_string()))
            }
            _ => warnings.push(RowWarning::new(line_no, "esperado `cadeia<TAB>menção`")),
        }
    }

    log_warnings("gold", &warnings);
    (rows, warnings)
}

/// Agrupa linhas pelo id de documento, na ordem em que cada id aparece primeiro.
pub fn group_by_doc<T>(rows: Vec<(String, T)>) -> Vec<(String, Vec<T>)> {
    let mut order: Vec<(String, Vec<T>)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for (doc_id, row) in rows {
        match position.get(&doc_id) {
            Some(&i) => order[i].1.push(row),
            None => {
                position.insert(doc_id.clone(), order.len());
                order.push((doc_id, vec![row]));
            }
        }
    }
    order
}

/// Monta documentos a partir das tabelas do RuCor e da saída do analisador.
///
/// Documentos sem saída do analisador ficam com o fluxo secundário vazio (todos
/// os tokens sem par, nenhuma menção).
pub fn assemble_documents(
    tokens: Vec<(String, TokenAnnotation)>,
    groups: Vec<(String, CorefGroup)>,
    mut secondary: HashMap<String, Vec<TokenAnnotation>>,
) -> Vec<Document> {
    let mut groups: HashMap<String, Vec<CorefGroup>> = group_by_doc(groups).into_iter().collect();
    group_by_doc(tokens)
        .into_iter()
        .map(|(id, primary)| Document {
            secondary: secondary.remove(&id).unwrap_or_default(),
            groups: groups.remove(&id).unwrap_or_default(),
            primary,
            id,
        })
        .collect()
}

// ===== DOCUMENTO DE DEMONSTRAÇÃO =====
//
// "Мальчик читал книгу брата. Он смотрел немедийное ток-шоу."
//
// O analisador separa `не` de `немедийное` e quebra `ток-шоу` em três pedaços,
// então o alinhamento exercita os casos de negação e divisão.

const DEMO_RUCOR_TOKENS: &str = "doc_id\tshift\tlength\ttoken\tlemma\tgram
demo\t0\t7\tМальчик\tмальчик\tNOUN,anim,masc sing,nomn
demo\t8\t5\tчитал\tчитать\tVERB,impf,tran masc,sing,past,indc
demo\t14\t5\tкнигу\tкнига\tNOUN,inan,femn sing,accs
demo\t20\t5\tбрата\tбрат\tNOUN,anim,masc sing,gent
demo\t25\t1\t.\t.\tPNCT
demo\t27\t2\tОн\tон\tNPRO,masc,3per,Anph sing,nomn
demo\t30\t7\tсмотрел\tсмотреть\tVERB,impf,tran masc,sing,past,indc
demo\t38\t10\tнемедийное\tнемедийный\tADJF,Qual neut,sing,accs
demo\t49\t7\tток-шоу\tток-шоу\tNOUN,inan,neut,Fixd sing,accs
demo\t56\t1\t.\t.\tPNCT
";

const DEMO_RUCOR_GROUPS: &str = "doc_id\tvariant\tgroup_id\tchain_id\tlink\tshift\tlength\tcontent\ttk_shifts
demo\t0\t1\t1\t0\t0\t7\tМальчик\t0
demo\t0\t2\t1\t1\t27\t2\tОн\t27
demo\t0\t3\t2\t0\t14\t11\tкнигу брата\t14,20
demo\t0\t4\t3\t0\t20\t5\tбрата\t20
";

const DEMO_NLC: &str = "Offset=0\tText=Мальчик\tParentOffset=8\tSC=BOY(1201)\tSemSlot=Agent(1)\tSurfSlot=$Subject(2)\tSP=Noun(7)
Offset=8\tText=читал\tParentOffset=-1\tSC=TO_READ(3310)\tSurfSlot=$Predicate(1)\tSP=Verb(3)
Offset=14\tText=книгу\tParentOffset=8\tSC=BOOK(2051)\tSemSlot=Object(4)\tSurfSlot=$Object(88)\tSP=Noun(7)
Offset=20\tText=брата\tParentOffset=14\tSC=BROTHER(1402)\tSemSlot=Possessor(9)\tSurfSlot=$Genitive(31)\tSP=Noun(7)
Offset=25\tText=.\tParentOffset=8

Offset=27\tText=Он\tParentOffset=30\tSC=PERSON(1000)\tSemSlot=Agent(1)\tSurfSlot=$Subject(2)\tSP=Noun(7)
Offset=30\tText=смотрел\tParentOffset=-1\tSC=TO_WATCH(3321)\tSurfSlot=$Predicate(1)\tSP=Verb(3)
Offset=38\tText=не\tParentOffset=40\tSC=NEGATION(17)\tSP=Particle(21)
Offset=40\tText=медийное\tParentOffset=53\tSC=MEDIA(4102)\tSemSlot=Characteristic(12)\tSurfSlot=$Modifier(40)\tSP=Adjective(5)
Offset=49\tText=ток\tParentOffset=53
Offset=52\tText=-\tParentOffset=53
Offset=53\tText=шоу\tParentOffset=30\tSC=TV_SHOW(4021)\tSemSlot=Object(4)\tSurfSlot=$Object(88)\tSP=Noun(7)
Offset=56\tText=.\tParentOffset=30
";

const DEMO_GOLD: &str = "1\tМальчик
1\tОн
2\tкнигу брата
3\tбрата
";

/// Documento de demonstração já montado (dois fluxos e quatro grupos).
pub fn demo_document() -> Document {
    let (tokens, _) = parse_rucor_tokens(DEMO_RUCOR_TOKENS);
    let (groups, _) = parse_rucor_groups(DEMO_RUCOR_GROUPS);
    let (sentences, _) = parse_nlc(DEMO_NLC);
    let secondary = HashMap::from([("demo".to_string(), sentences.concat())]);
    assemble_documents(tokens, groups, secondary)
        .into_iter()
        .next()
        .unwrap_or_else(|| Document::new("demo"))
}

/// Menções de referência do documento de demonstração, como `(cadeia, menção)`.
pub fn demo_gold_mentions() -> Vec<(String, String)> {
    parse_gold_mentions(DEMO_GOLD).0
}
