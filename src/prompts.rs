//! Prompt templates
//!
//! Every prompt is a pure function of its inputs so the same task always
//! renders the same text.

use crate::classifier::TaskType;
use crate::routing::{ProcessorKind, RoutingContext, COMPLETE_SENTINEL};
use crate::todoist::{Comment, Task};

/// How many comments a prompt shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentPolicy {
    pub max_comments: usize,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self { max_comments: 2 }
    }
}

impl CommentPolicy {
    pub fn new(max_comments: usize) -> Self {
        Self { max_comments }
    }

    /// First `max_comments` verbatim, then a count of the rest
    pub fn render(&self, comments: &[Comment]) -> String {
        if comments.is_empty() {
            return "No comments".to_string();
        }

        let mut lines: Vec<String> = comments
            .iter()
            .take(self.max_comments)
            .map(|c| format!("- [{}] {}", c.posted_at, c.content))
            .collect();

        let omitted = comments.len().saturating_sub(self.max_comments);
        if omitted > 0 {
            lines.push(format!("({omitted} more comments not shown)"));
        }
        lines.join("\n")
    }
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "None"
    } else {
        text
    }
}

fn task_block(task: &Task, project_name: &str) -> String {
    format!(
        "Content: {}\nDescription: {}\nProject: {}\nLabels: {}\nDue: {}\nPriority: {}",
        task.content,
        or_none(&task.description),
        project_name,
        task.labels_display(),
        task.due_display(),
        task.priority,
    )
}

/// Single-task classification prompt
pub fn classification_prompt(task: &Task) -> String {
    let types = TaskType::ALL
        .iter()
        .map(|t| format!("- {}: {}", t.as_str(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a task classifier. Classify this task into exactly one of these types:

TASK TYPES:
{types}

TASK:
ID: {id}
Content: {content}
Description: {description}
Labels: {labels}

OUTPUT FORMAT:
Return a JSON object {{"type": "<one of: research, planning, short, learning, abstract>"}}
or just the bare type word. No other text."#,
        id = task.id,
        content = task.content,
        description = or_none(&task.description),
        labels = task.labels_display(),
    )
}

pub fn research_prompt(task: &Task, project_name: &str, comments: CommentPolicy) -> String {
    format!(
        r#"You are a research task processor. Analyze this research task and create a research plan.

TASK:
{task}

COMMENTS:
{comments}

OUTPUT:
Generate a research plan that includes:
1. Key questions to investigate
2. Topics to explore
3. Types of sources needed

Return your analysis as a structured text response."#,
        task = task_block(task, project_name),
        comments = comments.render(&task.comments),
    )
}

pub fn next_action_prompt(task: &Task, project_name: &str, comments: CommentPolicy) -> String {
    format!(
        r#"You are a next action processor. Suggest the immediate next actionable step for this task.

TASK:
{task}

COMMENTS:
{comments}

OUTPUT:
Return exactly one concrete next action as 1-2 sentences.
Make it specific, actionable, and achievable in one sitting. No lists, no headings."#,
        task = task_block(task, project_name),
        comments = comments.render(&task.comments),
    )
}

/// Web search query for a planning task
pub fn planning_search_query(task: &Task) -> String {
    format!("how to {} step by step guide checklist", task.content.trim())
}

/// Search section of the planning prompt
#[derive(Debug, Clone, PartialEq)]
pub enum SearchSection {
    Results(String),
    Unavailable,
    Failed(String),
}

impl SearchSection {
    fn render(&self) -> String {
        match self {
            SearchSection::Results(text) if text.trim().is_empty() => {
                "Web search returned no results.".to_string()
            }
            SearchSection::Results(text) => text.clone(),
            SearchSection::Unavailable => "Web search not available.".to_string(),
            SearchSection::Failed(error) => format!(
                "Error performing web search: {error}\nAnalysis will proceed without web search results."
            ),
        }
    }
}

pub fn planning_prompt(
    task: &Task,
    project_name: &str,
    comments: CommentPolicy,
    search: &SearchSection,
) -> String {
    format!(
        r#"You are a planning processor. Assess progress on this goal and lay out what remains.

GOAL:
{goal}

DESCRIPTION:
{description}

PROJECT: {project}
DUE: {due}
PRIORITY: {priority}

STEPS TAKEN SO FAR (from task comments):
{comments}

WEB SEARCH RESULTS:
{search}

OUTPUT:
Produce a structured progress report with these sections:
1. Completed Steps: what has already been done, based on the comments
2. Required Steps: the full list of steps needed to reach the goal
3. Progress Estimate: a percentage with one sentence of justification
4. Next Actions: the 1-3 most important things to do next

Return your report as structured markdown."#,
        goal = task.content,
        description = or_none(&task.description),
        project = project_name,
        due = task.due_display(),
        priority = task.priority,
        comments = comments.render(&task.comments),
        search = search.render(),
    )
}

pub fn learning_prompt(
    task: &Task,
    project_name: &str,
    comments: CommentPolicy,
    context: Option<&str>,
) -> String {
    format!(
        r#"You are a learning curriculum builder. Create a learning path for this educational task.
{context}
TASK:
{task}

PROGRESS NOTES (task comments):
{comments}

OUTPUT:
Generate a learning plan with:
1. Current topic focus
2. Prerequisites to cover
3. Next learning steps
4. Practice/application ideas
5. Resources worth using

Build on any progress already recorded. Return your curriculum as structured markdown."#,
        context = context.unwrap_or_default(),
        task = task_block(task, project_name),
        comments = comments.render(&task.comments),
    )
}

pub fn abstract_prompt(
    task: &Task,
    project_name: &str,
    comments: CommentPolicy,
    context: Option<&str>,
) -> String {
    format!(
        r#"You are an abstract model builder. Generate insights for this conceptual task.
{context}
TASK:
{task}

NOTES SO FAR (task comments):
{comments}

OUTPUT:
Generate:
1. Key questions to explore
2. Parallels or analogies
3. Real-world applications
4. Different perspectives or stories

Return your analysis as structured markdown."#,
        context = context.unwrap_or_default(),
        task = task_block(task, project_name),
        comments = comments.render(&task.comments),
    )
}

/// Second learning call: one next step, conditioned on the curriculum
pub fn next_step_prompt(
    task: &Task,
    curriculum: &str,
    comments: CommentPolicy,
    context: Option<&str>,
) -> String {
    format!(
        r#"You are helping someone make steady progress on a learning goal.
{context}
GOAL: {content}
DESCRIPTION: {description}

RECENT PROGRESS (task comments):
{comments}

LEARNING PLAN:
{curriculum}

OUTPUT:
Return ONE concrete next step the learner can do today, as a single sentence.
It must follow from the plan above and from the recorded progress. No preamble."#,
        context = context.unwrap_or_default(),
        content = task.content,
        description = or_none(&task.description),
        comments = comments.render(&task.comments),
        curriculum = curriculum,
    )
}

/// Next-step decision prompt for the model-driven router
pub fn routing_prompt(ctx: &RoutingContext<'_>) -> String {
    let history = if ctx.history.is_empty() {
        "None yet".to_string()
    } else {
        ctx.history
            .iter()
            .map(ProcessorKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let workers = ProcessorKind::ALL
        .iter()
        .map(|kind| format!("- {}: {}", kind.as_str(), kind.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are the task-loop executor. Route this task to the right worker and decide when it is complete.

CURRENT TASK:
ID: {id}
Content: {content}
Description: {description}
Classification: {task_type}
Priority: {priority}

PROCESSING HISTORY FOR THIS TASK:
Workers that have processed it: {history}

LAST WORKER OUTPUT:
{last_output}

VALID WORKER NAMES:
{workers}
- {sentinel}: this task is fully processed, move to the next task

ROUTING STEP: {iteration} of at most {max_iterations}
TASKS REMAINING: {remaining} (including current)

ROUTING RULES:
- Match task type to worker: research → research_processor, planning → planning_processor,
  learning/abstract → learning_processor, short → next_action_processor
- Do not send a task to a worker it has already visited
- Once the matching worker has run, the task is complete

OUTPUT FORMAT:
Return a JSON object:
{{
  "goto": "worker_name_or_{sentinel}",
  "reason": "One sentence explaining the decision",
  "is_complete": true_or_false
}}

Return ONLY the JSON object, no other text."#,
        id = ctx.task.id,
        content = ctx.task.content,
        description = or_none(&ctx.task.description),
        task_type = ctx.task_type,
        priority = ctx.task.priority,
        history = history,
        last_output = ctx.last_output.unwrap_or("Task just entered the loop"),
        workers = workers,
        sentinel = COMPLETE_SENTINEL,
        iteration = ctx.iteration,
        max_iterations = ctx.max_iterations,
        remaining = ctx.tasks_remaining,
    )
}
