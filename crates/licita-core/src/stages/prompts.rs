//! System prompts and user-prompt builders for each stage.
//!
//! The JSON keys requested here are the keys the `from_json` parsers read.
//! Bump a stage's version whenever its prompt text changes, since the version
//! is stored with every stage record.

use serde_json::Value;

use super::Stage;
use crate::training::DEFAULT_CATEGORIES;

pub const BASIC_DATA_VERSION: &str = "2.0";
pub const ESTIMATED_VALUE_VERSION: &str = "1.0";
pub const ITEMS_VERSION: &str = "3.0";
pub const REQUIREMENTS_VERSION: &str = "2.0";
pub const FEASIBILITY_VERSION: &str = "1.0";
pub const SUMMARY_VERSION: &str = "1.0";

pub fn version(stage: Stage) -> &'static str {
    match stage {
        Stage::BasicData => BASIC_DATA_VERSION,
        Stage::EstimatedValue => ESTIMATED_VALUE_VERSION,
        Stage::Items => ITEMS_VERSION,
        Stage::Requirements => REQUIREMENTS_VERSION,
        Stage::Feasibility => FEASIBILITY_VERSION,
        Stage::Summary => SUMMARY_VERSION,
    }
}

pub fn system_prompt(stage: Stage) -> &'static str {
    match stage {
        Stage::BasicData => {
            "You are a senior analyst of Brazilian public procurement with twenty years of \
             experience. You extract structured data from procurement notices (editais) with \
             surgical precision. Answer ONLY with valid JSON, with no text before or after it."
        }
        Stage::EstimatedValue => {
            "You are a financial analyst specialised in Brazilian procurement notices. Your only \
             job is to locate estimated values precisely, looking at the preamble, the object, \
             price tables, summaries and annexes. Answer ONLY with valid JSON."
        }
        Stage::Items => {
            "You extract the items of Brazilian procurement notices with complete fidelity to \
             the text. List EVERY product and service to be purchased that appears in the \
             excerpt, keeping numbering, descriptions and values exactly as printed. Answer \
             ONLY with valid JSON."
        }
        Stage::Requirements => {
            "You are a senior compliance consultant for Brazilian public procurement. Identify \
             EVERY qualification requirement of the notice, organised by category, thoroughly \
             and precisely. Answer ONLY with valid JSON."
        }
        Stage::Feasibility => {
            "You are a senior consultant assessing whether a manufacturer of corporate, school \
             and hospital furniture should bid in Brazilian public procurement. Be realistic, \
             objective and useful for decision making. Answer ONLY with valid JSON."
        }
        Stage::Summary => {
            "You are a senior procurement analyst writing an executive report for the board of \
             a furniture manufacturer. Be objective, direct and professional, without needless \
             jargon. Answer ONLY with valid JSON."
        }
    }
}

fn hints_section(hints: &str) -> String {
    if hints.trim().is_empty() {
        String::new()
    } else {
        format!("\nADDITIONAL LEARNED RULES:\n{}\n", hints.trim_end())
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn basic_data(text: &str, hints: &str) -> String {
    format!(
        r#"Extract the basic data of the notice excerpt below.

OUTPUT FORMAT (JSON required):
{{
  "numero_edital": "string or null",
  "numero_processo": "string or null",
  "modalidade": "pregao_eletronico|pregao_presencial|concorrencia|tomada_de_precos|convite|leilao|dispensa|inexigibilidade|outro",
  "objeto": "full description of the procurement object",
  "orgao": {{
    "nome": "full official name of the issuing body",
    "nome_curto": "short practical name (e.g. 'IFSP Campinas', 'Prefeitura de Curitiba')",
    "cnpj": "XX.XXX.XXX/XXXX-XX or null",
    "municipio": "string or null",
    "uf": "two-letter state code or null",
    "esfera": "federal|estadual|municipal"
  }},
  "valor_estimado": null_or_plain_number,
  "data_abertura": "ISO 8601, e.g. 2025-03-15T10:00:00-03:00, or null",
  "data_encerramento": "ISO 8601 or null",
  "prazo_execucao_dias": null_or_integer,
  "endereco_entrega": "string or null",
  "municipio_entrega": "string or null",
  "uf_entrega": "two-letter state code or null",
  "condicoes_pagamento": "payment term and method or null",
  "criterio_julgamento": "menor_preco|maior_desconto|tecnica_e_preco|melhor_tecnica|outro"
}}

MANDATORY RULES:
- Extract ONLY information explicitly present in the text
- Dates always in ISO 8601 with the Brazilian offset (-03:00 or -02:00)
- Money as a plain number (125000.00, never "R$ 125.000,00")
- Return null for anything not found; NEVER invent information
- Keep the CNPJ formatted as XX.XXX.XXX/XXXX-XX
- For nome_curto prefer the well-known acronym plus state or campus ("TCE-GO", "IFSP Campinas"); without an acronym, shorten the name keeping city or state
{hints}
NOTICE TEXT:
{text}"#,
        hints = hints_section(hints),
        text = text,
    )
}

pub fn estimated_value(text: &str, hints: &str) -> String {
    format!(
        r#"Find the total estimated value of the procurement and the value of each lot or group in the notice text below.

OUTPUT FORMAT (JSON required):
{{
  "valor_estimado_total": plain_number_or_null,
  "moeda": "BRL",
  "valores_por_lote": [
    {{
      "lote": "lot identification (e.g. 'Lote 01', 'Grupo 1')",
      "descricao": "short lot description",
      "valor": plain_number
    }}
  ],
  "fonte_do_valor": "where the value was found (e.g. 'Cláusula 3.1', 'Anexo I - Planilha de Preços')",
  "confianca": "alta|media|baixa",
  "observacao": "relevant note (confidential value, per-item values not totalled) or null"
}}

RULES:
- Search EVERY section: preamble, clauses, tables, annexes
- Convert "R$" amounts to plain numbers (R$ 1.250.000,00 -> 1250000.00)
- If the value is confidential or undisclosed, return null and explain in observacao
- Prefer the TOTAL value; with only per-lot values, add them up
- When sections disagree, use the preamble/object value and mention the divergence
- confianca "alta" = explicit value; "media" = inferred from a sum; "baixa" = ambiguous
{hints}
NOTICE TEXT:
{text}"#,
        hints = hints_section(hints),
        text = text,
    )
}

/// `index` is 0-based; the prompt shows it 1-based.
pub fn items(text: &str, index: usize, total: usize, categories: &[String], hints: &str) -> String {
    let categories = if categories.is_empty() {
        DEFAULT_CATEGORIES.join(", ")
    } else {
        categories.join(", ")
    };
    let block = index + 1;

    format!(
        r#"Extract EVERY item (product or service to be purchased) that appears in the excerpt below. This is block {block} of {total} of the notice.

OBLIGATIONS:
- Be FAITHFUL to the text: copy descriptions and specifications as printed
- Include every table row, list entry or quantity line that is an item to be bought or contracted
- Keep item and lot numbering exactly as in the document
- Fill as many fields as possible (quantity, unit, unit value, total value)
- descricao_detalhada holds the full specification when the notice has one
- Values as plain numbers (1250.50), no "R$" and no thousands separator

OUTPUT FORMAT (JSON required):
{{
  "itens": [
    {{
      "numero_item": "exactly as in the notice (e.g. '001', '1', 'Item 3')",
      "numero_lote": "e.g. 'Lote 01', '1' or null",
      "nome_lote": "lot name or null",
      "descricao": "item name or title (up to 150 characters)",
      "descricao_detalhada": "full technical specification copied from the notice",
      "unidade": "UN, CJ, M², PCT, KG, ... or null",
      "quantidade": number_or_null,
      "valor_unitario_estimado": number_or_null,
      "valor_total_estimado": number_or_null,
      "especificacoes": {{
        "material": "e.g. MDF 18mm or null",
        "cor": "or null",
        "dimensoes": "e.g. 1,60m x 0,80m or null",
        "normas_tecnicas": ["ABNT NBR ..."],
        "acabamento": "or null",
        "capacidade_carga": "e.g. 120kg or null"
      }},
      "codigo_catmat": "CATMAT/CATSER code or null",
      "categoria": "one of: {categories}",
      "confianca_quantidade": "alta if explicit, media if inferred, baixa if absent"
    }}
  ],
  "total_itens_encontrados": integer,
  "chunk_info": "e.g. Block with items 1 to 20"
}}

RULES:
- Include ALL items visible in this excerpt, however many
- Do not invent items that are not in the text
- If the excerpt has no items (only clauses, cover page, ...), return {{"itens": [], "total_itens_encontrados": 0, "chunk_info": "No items in this excerpt"}}
- For furniture, dimensions in metres (W x D x H) and ABNT standards when cited
{hints}
NOTICE TEXT (block {block}/{total}):
{text}"#,
        block = block,
        total = total,
        categories = categories,
        hints = hints_section(hints),
        text = text,
    )
}

pub fn requirements(text: &str, hints: &str) -> String {
    let entry = r#"{ "descricao": "...", "obrigatorio": true, "dificuldade": "baixa|media|alta", "observacao": "note or null" }"#;
    format!(
        r#"Extract ALL qualification requirements, required documents, certifications and important deadlines from the notice excerpt below, organised by category.

OUTPUT FORMAT (JSON required):
{{
  "habilitacao_juridica": [{entry}],
  "qualificacao_tecnica": [{entry}],
  "qualificacao_economica": [{entry}],
  "documentos_fiscais": [{entry}],
  "requisitos_amostra": [{entry}],
  "garantias": [{entry}],
  "prazos_importantes": [{{ "descricao": "...", "data": "ISO 8601 or null", "obrigatorio": true, "dificuldade": "baixa|media|alta", "observacao": "note or null" }}],
  "certificacoes": [
    {{
      "nome": "official certification name",
      "tipo": "abnt|inmetro|iso|procel|anvisa|bpm|outro",
      "norma": "e.g. ABNT NBR 16069:2012 or null",
      "descricao": "what exactly is required",
      "obrigatoria": true,
      "aplica_a": "geral or the item it applies to"
    }}
  ],
  "visita_tecnica_obrigatoria": true_false_or_null,
  "resumo_requisitos": "paragraph with the main requirements and points of attention"
}}

DIFFICULTY:
- "baixa": standard document, easy to obtain (clearance certificates, articles of association)
- "media": needs preparation (capacity statements, professional council registration)
- "alta": slow or costly (laboratory tests, INMETRO certification, samples)

FURNITURE:
- Identify ABNT standards: NBR 13961 (office), NBR 16069 (wood), NBR 15963 (school), NBR 14790 (upholstered)
- Capture laboratory tests required from INMETRO/ABNT accredited labs
- Check origin certificates (FSC, IBAMA) and minimum quantities in capacity statements
- Check CREA, CAU or other council registration
{hints}
NOTICE TEXT:
{text}"#,
        entry = entry,
        hints = hints_section(hints),
        text = text,
    )
}

pub fn feasibility(context: &Value) -> String {
    format!(
        r#"Using the data extracted from the notice below, decide whether a furniture manufacturer should bid.

COMPANY PROFILE:
- Manufacturer of corporate, school and hospital furniture
- Materials: MDF, MDP, SAE 1020 steel, solid reforestation wood
- ABNT certifications available for standard product lines
- Medium production capacity (up to 500 pieces per month for complex projects)
- Economical delivery radius up to 600 km
- Minimum production time: 30 days for small lots, 60-90 days for large ones

NOTICE DATA (JSON):
{context}

OUTPUT FORMAT (JSON required):
{{
  "veredicto": "viavel|parcialmente_viavel|inviavel",
  "score": number_0_to_100,
  "justificativa": "objective paragraph explaining the verdict",
  "itens_analise": [
    {{
      "numero_item": "string",
      "descricao": "short description",
      "pode_produzir": true_or_false,
      "nota_viabilidade": number_0_to_100,
      "justificativa": "why the item can or cannot be produced",
      "restricoes": ["specific restrictions"]
    }}
  ],
  "pontos_atencao": ["alerts the bidding team must check"],
  "vantagens_competitivas": ["where the company has an edge"],
  "certificacoes_faltantes": ["certifications the company would need"],
  "estimativa_complexidade": "baixa|media|alta",
  "impacto_logistico": "baixo|medio|alto",
  "recomendacao": "PARTICIPAR / NÃO PARTICIPAR / PARTICIPAR COM RESSALVAS followed by the reason in one or two sentences"
}}

CRITERIA:
- Standard furniture (chairs, desks, common cabinets) -> high feasibility
- FSC-certified exotic solid wood -> major restriction
- Mandatory INMETRO/ABNT tests before the bid -> high difficulty, certification lead time
- More than 1000 units with less than 60 days -> capacity risk
- Delivery beyond 600 km -> medium to high logistic impact
- Performance bond above 10% of the value -> working capital attention
- Very specific technical standards -> check current compliance"#,
        context = pretty(context),
    )
}

pub fn summary(context: &Value) -> String {
    format!(
        r#"Write a complete, objective executive summary of this procurement notice for a board decision.

FULL ANALYSIS DATA (JSON):
{context}

OUTPUT FORMAT (JSON required):
{{
  "titulo_resumo": "one line describing the notice (e.g. 'Pregão 042/2025 - IFSP Campinas: 87 ergonomic chairs and 23 desks')",
  "resumo_executivo": "3 to 5 paragraphs: object and context, main items, critical requirements, opportunity and risk, recommendation",
  "dados_chave": {{
    "valor_total_estimado": number_or_null,
    "quantidade_total_itens": integer,
    "prazo_entrega_dias": number_or_null,
    "data_limite_proposta": "ISO 8601 or null",
    "modalidade": "string",
    "orgao": "issuing body name"
  }},
  "oportunidade": {{
    "score": number_0_to_100,
    "nivel": "excelente|boa|regular|baixa|nula",
    "motivo": "one-sentence reason"
  }},
  "proximas_acoes": [
    {{
      "acao": "clear, actionable step",
      "prazo": "imediato|esta_semana|proximas_2_semanas|antes_abertura",
      "responsavel": "comercial|juridico|producao|diretoria|financeiro"
    }}
  ],
  "palavras_chave": ["relevant tags: furniture types, standards, issuing body, location, value"]
}}

INSTRUCTIONS:
- resumo_executivo must be useful to someone who will not read the notice
- proximas_acoes must be practical and specific: document preparation, certificates, deadline checks"#,
        context = pretty(context),
    )
}
