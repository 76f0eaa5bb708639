//! Prompt construction for grounding calls.

/// Action methods the execution layer supports.
pub const SUPPORTED_ACTIONS: &[&str] = &[
    "click",
    "fill",
    "type",
    "press",
    "scrollTo",
    "scrollIntoView",
    "nextChunk",
    "prevChunk",
];

/// Optional caller-supplied instructions appended to system prompts.
pub fn build_user_instructions_string(user_provided_instructions: Option<&str>) -> String {
    match user_provided_instructions {
        None | Some("") => String::new(),
        Some(instructions) => format!(
            "\n\n# Custom Instructions Provided by the User\n\n\
             Please keep the user's instructions in mind when performing actions. \
             If the user's instructions are not relevant to the current task, ignore them.\n\n\
             User Instructions:\n{}",
            instructions
        ),
    }
}

pub fn build_observe_system_prompt(user_provided_instructions: Option<&str>) -> String {
    let base = format!(
        "You are helping the user automate the browser by finding elements based on \
         what the user wants to observe in the page.\n\n\
         You will be given:\n\
         1. an instruction of elements to observe\n\
         2. a hierarchical accessibility tree showing the semantic structure of the page. \
         The tree is a hybrid of the DOM and the accessibility tree.\n\n\
         Return an array of elements that match the instruction if they exist, otherwise \
         return an empty array. Whenever suggesting actions, use supported locator methods \
         or preferably one of the following supported actions:\n{}",
        SUPPORTED_ACTIONS.join(", ")
    );
    let content = normalize_ws(&base);

    let user_instructions = build_user_instructions_string(user_provided_instructions);
    if user_instructions.is_empty() {
        content
    } else {
        format!("{}\n\n{}", content, user_instructions)
    }
}

pub fn build_observe_user_message(instruction: &str, tree_elements: &str) -> String {
    format!(
        "instruction: {}\nAccessibility Tree: {}",
        instruction, tree_elements
    )
}

pub fn build_extract_system_prompt(user_provided_instructions: Option<&str>) -> String {
    let base = "You are extracting content on behalf of a user. \
        If a user asks you to extract a 'list' of information, or 'all' information, \
        YOU MUST EXTRACT ALL OF THE INFORMATION THAT THE USER REQUESTS.\n\n\
        You will be given:\n\
        1. An instruction\n\
        2. A list of DOM elements to extract from.\n\n\
        Print the exact text from the DOM+accessibility tree elements with all symbols, \
        characters, and endlines as is.\n\
        Print null or an empty string if no new information is found.\n\n\
        If a user is attempting to extract links or URLs, you MUST respond with ONLY the \
        IDs of the link elements.\n\
        Do not attempt to extract links directly from the text unless absolutely necessary.";
    let content = normalize_ws(base);

    let user_instructions = build_user_instructions_string(user_provided_instructions);
    if user_instructions.is_empty() {
        content
    } else {
        format!("{}\n\n{}", content, user_instructions)
    }
}

pub fn build_extract_user_prompt(instruction: &str, tree_elements: &str) -> String {
    format!(
        "Instruction: {}\nDOM+accessibility tree: {}",
        instruction, tree_elements
    )
}

/// Instruction used when act delegates to observe to pick one element.
pub fn build_act_observe_prompt(
    action: &str,
    variables: Option<&std::collections::HashMap<String, String>>,
) -> String {
    let mut instruction = format!(
        "Find the most relevant element to perform an action on given the following action: {}.\n\
         Provide an action for this element such as {}, or any other supported locator method. \
         Remember that to users, buttons and links look the same in most cases.\n\
         If the action is completely unrelated to a potential action to be taken on the page, \
         return an empty array.\n\
         ONLY return one action. If multiple actions are relevant, return the most relevant one.\n\
         If the user is asking to scroll to a position on the page, e.g., 'halfway' or 0.75, etc, \
         you must return the argument formatted as the correct percentage, e.g., '50%' or '75%', etc.\n\
         If the user is asking to scroll to the next chunk/previous chunk, choose the \
         nextChunk/prevChunk method. No arguments are required here.\n\
         If the action implies a key press, e.g., 'press enter', 'press a', 'press space', etc., \
         always choose the press method with the appropriate key as argument, e.g. 'a', 'Enter', \
         'Space'. Do not choose a click action on an on-screen keyboard. Capitalize the first \
         character like 'Enter', 'Tab', 'Escape' only for special keys.",
        action,
        SUPPORTED_ACTIONS.join(", ")
    );

    if let Some(variables) = variables {
        if !variables.is_empty() {
            let mut keys: Vec<&str> = variables.keys().map(|k| k.as_str()).collect();
            keys.sort_unstable();
            instruction.push_str(&format!(
                " The following variables are available to use in the action: {}. \
                 Fill the argument variables with the variable name.",
                keys.join(", ")
            ));
        }
    }

    instruction
}

/// Default instruction for observe when the caller supplies none.
pub fn default_observe_instruction() -> String {
    "Find elements that can be used for any future actions in the page. These may be \
     navigation links, related pages, section/subsection links, buttons, or other interactive \
     elements. Be comprehensive: if there are multiple elements that may be relevant for future \
     actions, return all of them."
        .to_string()
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
