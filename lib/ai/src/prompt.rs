//! Instructions for the reasoning backend.

/// System instruction for the decide step.
pub const SYSTEM_PROMPT: &str = "\
You are a customer-service assistant for shipping-fee insurance. Shipping-fee \
insurance reimburses the return shipping cost when a customer returns or \
exchanges goods.

Use the available tools to answer questions about whether a good is covered \
and about the after-sale cases of an order. When the user asks about a good \
or an order without identifying it, use the tool that asks for the missing \
information. When you already have what you need, reply directly, briefly, \
and politely.";

/// System instruction for the final natural-language reply.
pub const RESPONSE_PROMPT: &str = "\
You are a customer-service assistant for shipping-fee insurance. Based on the \
conversation so far, including any tool results, write a short, friendly \
reply to the user's latest message. Do not invent order, case, or \
compensation details that do not appear in the conversation.";

/// Reply used when no reply could be produced.
pub const APOLOGY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

/// Summarizes the conversation for the decide step.
#[must_use]
pub fn context_summary(turns: usize, last_tool: Option<&str>, tools: &[String]) -> String {
    format!(
        "Conversation so far:\n\
         - turns: {turns}\n\
         - last tool used: {}\n\
         - available tools: {}\n\n\
         Decide whether to call a tool or reply to the user directly. If you \
         call a tool, pick the most suitable one.",
        last_tool.unwrap_or("none"),
        tools.join(", ")
    )
}

/// Full system instruction for the decide step.
#[must_use]
pub fn decide_instruction(turns: usize, last_tool: Option<&str>, tools: &[String]) -> String {
    format!("{SYSTEM_PROMPT}\n\n{}", context_summary(turns, last_tool, tools))
}
