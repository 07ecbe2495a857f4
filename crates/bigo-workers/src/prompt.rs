//! Prompt construction for chat-style backends.

use bigo_core::WorkItem;

/// Wrap a work item in the standard engineering prompt.
pub fn build_task_prompt(item: &WorkItem) -> String {
    let mut prompt = format!(
        "You are an expert software engineer. Complete the following task:\n\n## Task\n{}\n\n",
        item.title
    );

    if !item.description.is_empty() {
        prompt.push_str(&format!("## Details\n{}\n\n", item.description));
    }

    prompt.push_str(
        "## Instructions\n\
         - Provide clear, working code\n\
         - Include brief explanations for non-obvious decisions\n\
         - If the task is ambiguous, state your assumptions\n\
         - Format code properly with appropriate language tags\n\
         \n\
         ## Response\n",
    );
    prompt
}
