// All LLM prompt constants for the Triage module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for resume analysis. Enforces JSON-only output.
pub const ANALYSIS_SYSTEM: &str = "You are an AI resume analyzer working for a recruiter. \
    You compare one attached resume against a job description and report a structured assessment. \
    You MUST respond with valid JSON only. No markdown, no explanations.";

/// Analysis prompt. The resume itself is attached as a document ahead of this text.
/// Replace `{job_description}` and `{evidence_instruction}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the attached resume and compare it to the job description.

Job Description:
{job_description}

{evidence_instruction}

Return a JSON object with exactly these fields:
{
  "name": "candidate's full name, or null if not stated",
  "candidateEmail": "candidate's email address, or null if not stated",
  "matchScore": number from 0 to 100 (how well the resume matches the job description),
  "topSkills": ["the candidate's top skills, most relevant first"],
  "highlights": "a summary of the candidate's strengths",
  "weakPoints": "weaknesses or concerns relative to the job description",
  "suggestions": "suggestions to improve the resume",
  "interviewQuestions": ["interview questions tailored to this candidate"],
  "modelAnswers": ["a model answer for each interview question, in the same order"]
}

Rules:
- matchScore is a plain number, not a string and not a percentage sign.
- modelAnswers must have exactly one entry per interviewQuestions entry.
- Do not rank the candidate against others; ranking is done separately."#;

/// System prompt for salary estimation. Free-text output.
pub const SALARY_SYSTEM: &str = "You are a compensation analyst helping a recruiter \
    prepare an offer. Answer in two or three sentences of plain text. \
    State a concrete salary range first, then the main reasons.";

/// Salary estimation prompt.
/// Replace `{job_description}`, `{expected_salary}`, `{top_skills}`, `{highlights}`,
/// `{resume_text}` and `{evidence_instruction}` before sending.
pub const SALARY_PROMPT_TEMPLATE: &str = r#"Suggest an appropriate salary for this shortlisted candidate.

Job Description:
{job_description}

Budgeted / expected salary for the role: {expected_salary}

Candidate top skills: {top_skills}
Candidate highlights: {highlights}

Resume:
{resume_text}

{evidence_instruction}

Stay close to the budgeted salary unless the candidate's experience clearly justifies moving above or below it."#;
