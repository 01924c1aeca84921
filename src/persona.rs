//! Fixed texts of the Nexus advisor persona.
//!
//! The product speaks Brazilian Portuguese; these strings are configuration
//! constants and never come from user input.

/// System instruction sent with every advisor request.
pub const ADVISOR_SYSTEM_INSTRUCTION: &str = "Você é o Nexus AI, um consultor financeiro Web3 avançado e especialista em blockchain.
Ajude o usuário com análises de mercado, explicações sobre smart contracts, gestão de risco e estratégias DeFi.
Mantenha as respostas concisas, profissionais e em Português do Brasil. Use formatação Markdown.";

/// First assistant turn of every new session.
pub const ADVISOR_GREETING: &str = "Olá! Sou o Nexus AI Advisor. Posso ajudar você a analisar riscos, explicar contratos inteligentes ou sugerir estratégias de investimento DeFi. Como posso ajudar hoje?";

/// Replaces the pending reply when generation fails for any reason.
pub const FALLBACK_REPLY: &str = "Desculpe, encontrei um erro ao processar sua solicitação. Tente novamente mais tarde.";

/// Shown by front-ends while the pending reply is still empty.
pub const THINKING_PLACEHOLDER: &str = "Pensando...";

/// Shown by front-ends when image generation fails.
pub const IMAGE_FAILURE_MESSAGE: &str = "Erro ao gerar imagem. Verifique se a chave API foi selecionada.";

/// Default reasoning budget for advisor replies.
pub const DEFAULT_THINKING_BUDGET: u32 = 1024;
