//! Built-in demo questions and question-file parsing

use crate::pipeline::Question;

const SHADOW_PROJECTION: &str = "Given is a light source at the position
L=(1,3,0)T
and an object with the point
P=(1,2,1)
.

If we draw the projected shadow of the object on the plane y=1, what is the position P' of the point P projected on the plane y=1?

Hint: Make yourself an illustration of the situation.
";

const RAY_PLANE_PARALLEL: &str = r"Given is a plane 3x+2y-z=3 and a ray

$p(t)=\left(\begin{array}{l}1 \\ 0 \\ 1\end{array}\right)+t *\left(\begin{array}{c}-1 \\ c \\ 0\end{array}\right)$

For what value of c is the ray parallel to the plane?
";

/// Questions used when none are given on the command line
pub fn demo_questions() -> Vec<Question> {
    vec![
        Question::new(SHADOW_PROJECTION),
        Question::new(RAY_PLANE_PARALLEL),
    ]
}

/// Split a questions file on lines consisting solely of `---`.
/// Blank entries are dropped.
pub fn parse_questions(content: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if line.trim() == "---" {
            push_question(&mut questions, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_question(&mut questions, &mut current);
    questions
}

fn push_question(questions: &mut Vec<Question>, current: &mut String) {
    let text = std::mem::take(current);
    if !text.trim().is_empty() {
        questions.push(Question::new(text.trim()));
    }
}
