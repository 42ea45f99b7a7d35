//! Prompt construction for code-generating and image-describing requests.
//!
//! Every prompt asks for a self-contained Plotly script that writes its figure
//! to an HTML file in the current directory. The executor relies on that last
//! part to find the artifact afterwards.

use crate::clients::{ChatMessage, ContentPart};
use crate::image::ImageAttachment;

pub const CODE_SYSTEM_PROMPT: &str = "You are an AI tutor specializing in computer graphics. \
Given the following question, generate a Python script using Plotly that visualizes the \
scenario described and save it as html. The code should be self-contained and executable, \
including all necessary imports and definitions.";

pub const IMAGE_CODE_SYSTEM_PROMPT: &str = "You are an AI assistant specializing in computer \
graphics. Given the following question, image description, and image, generate a complete, \
self-contained Python script using Plotly that visualizes the scenario described. The code \
should include all necessary imports and definitions and save the figure as an HTML file. \
Please output only the code inside a standalone Python code block, without additional \
explanations.";

pub const IMAGE_DESCRIPTION_SYSTEM_PROMPT: &str = "You are an AI assistant specializing in \
computer graphics. Given the following image, provide a detailed description of the main \
objects, shapes, and visual effects present in the image. Focus on identifying key elements \
like the type of objects, their positions, their interactions (e.g., cutting, overlapping), \
and any effects such as shading, lighting, or reflections. The description should be \
concise, informative, and focus on elements that are most relevant for recreating the scene \
programmatically.";

const IMAGE_DESCRIPTION_REQUEST: &str = "Provide a detailed and concise description of the main \
objects, shapes, interactions, and visual effects in the image, focusing on details relevant \
for generating a graphical representation.";

/// Skeleton the model is asked to fill in
const CODE_SKELETON: &str = "```python
import numpy as np
import plotly.graph_objects as go
import time

fig.write_html(f'temp_{time.time()}.html')
```";

/// Messages asking for a visualization script for a text-only question
pub fn build_code_prompt(question: &str) -> Vec<ChatMessage> {
    let user = format!(
        "\n##Question:\n{}\n\n##Output:\n\nFill below Python code in a standalone code block.\n{}\n",
        question.trim(),
        CODE_SKELETON
    );
    vec![
        ChatMessage::system(CODE_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ]
}

pub fn build_image_description_prompt(image: &ImageAttachment) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(IMAGE_DESCRIPTION_SYSTEM_PROMPT),
        ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: IMAGE_DESCRIPTION_REQUEST.to_string(),
            },
            image.as_part(),
        ]),
    ]
}

/// Messages asking for a visualization script guided by an image and its description
pub fn build_image_code_prompt(
    question: &str,
    image_description: &str,
    image: &ImageAttachment,
) -> Vec<ChatMessage> {
    let text = format!(
        "\n## Question:\n{}\n\n## Image Description:\n{}\n\n## Output:\nProvide the Python code in a standalone code block.\n\n{}\n",
        question.trim(),
        image_description.trim(),
        CODE_SKELETON
    );
    vec![
        ChatMessage::system(IMAGE_CODE_SYSTEM_PROMPT),
        ChatMessage::user_parts(vec![ContentPart::Text { text }, image.as_part()]),
    ]
}
