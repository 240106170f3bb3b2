use vo_memory::MemoryEntry;

/// How much of the recent user text feeds the memory relevance query.
pub const MEMORY_QUERY_CHARS: usize = 500;

/// Static description of the agent being run.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    /// Base system prompt.
    pub prompt: String,
    /// Name the bot answers to in group chats.
    pub bot_name: String,
    /// Pre-rendered skill summaries (the skill-file parser is a collaborator).
    pub skills: Vec<SkillSummary>,
}

#[derive(Debug, Clone)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
}

/// Per-turn prompt sections, composed in a fixed order:
/// base prompt, relevant memories, skills, group policy, previous-session
/// bridge, trigger prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptSections {
    pub memories: Vec<(MemoryEntry, f64)>,
    pub is_group: bool,
    pub bridge_context: Option<String>,
    pub trigger_prompt: Option<String>,
}

/// Assemble the full system prompt for one turn.
pub fn build_system_prompt(spec: &AgentSpec, sections: &PromptSections) -> String {
    let mut out = spec.prompt.clone();

    if !sections.memories.is_empty() {
        out.push_str("\n\n## Relevant Memories\n");
        for (entry, _) in &sections.memories {
            out.push_str(&format!("- {}\n", entry.value));
        }
    }

    if !spec.skills.is_empty() {
        out.push_str("\n\n## Skills\n");
        for skill in &spec.skills {
            out.push_str(&format!("- {}: {}\n", skill.name, skill.description));
        }
    }

    if sections.is_group {
        out.push_str(&format!(
            "\n\n## Group Chat Policy\n\
             You are one participant in a multi-party channel. Only respond \
             when you are addressed (your name is {bot}) or when you have \
             something genuinely useful to add. If no response is warranted, \
             reply with exactly NO_REPLY and nothing else.",
            bot = spec.bot_name,
        ));
    }

    if let Some(bridge) = &sections.bridge_context {
        out.push_str("\n\n## Previous Session Context\n");
        out.push_str(bridge);
    }

    if let Some(trigger) = &sections.trigger_prompt {
        out.push_str("\n\n");
        out.push_str(trigger);
    }

    out
}

/// Build the memory relevance query from the most recent user text.
///
/// Takes user messages newest-first until the cap, then restores order;
/// the tail of the conversation is what the next turn is about.
pub fn memory_query(user_texts: &[&str]) -> String {
    let mut picked: Vec<&str> = Vec::new();
    let mut total = 0usize;
    for text in user_texts.iter().rev() {
        if total + text.len() > MEMORY_QUERY_CHARS && !picked.is_empty() {
            break;
        }
        total += text.len();
        picked.push(text);
        if total >= MEMORY_QUERY_CHARS {
            break;
        }
    }
    picked.reverse();
    let mut query = picked.join(" ");
    if query.len() > MEMORY_QUERY_CHARS {
        query = query.chars().take(MEMORY_QUERY_CHARS).collect();
    }
    query
}
