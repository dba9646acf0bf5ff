//! Static catalog of insertable palette tokens.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteToken {
    pub label: &'static str,
    pub tex: &'static str,
    pub needs_advanced: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PaletteCategory {
    pub key: &'static str,
    pub title: &'static str,
    pub tokens: &'static [PaletteToken],
}

impl PaletteCategory {
    pub fn token_id(&self, index: usize) -> String {
        format!("{}-{index}", self.key)
    }
}

const fn token(tex: &'static str) -> PaletteToken {
    PaletteToken {
        label: tex,
        tex,
        needs_advanced: false,
    }
}

const fn advanced(tex: &'static str) -> PaletteToken {
    PaletteToken {
        label: tex,
        tex,
        needs_advanced: true,
    }
}

/// Greek letters carry a trailing space so the next token does not merge
/// into the command name.
const fn spaced(label: &'static str, tex: &'static str) -> PaletteToken {
    PaletteToken {
        label,
        tex,
        needs_advanced: false,
    }
}

pub const CATEGORIES: &[PaletteCategory] = &[
    PaletteCategory {
        key: "digits",
        title: "Digits",
        tokens: &[
            token("0"),
            token("1"),
            token("2"),
            token("3"),
            token("4"),
            token("5"),
            token("6"),
            token("7"),
            token("8"),
            token("9"),
        ],
    },
    PaletteCategory {
        key: "calculus",
        title: "Derivatives & gradients",
        tokens: &[
            token(r"\frac{d}{dx} f(x)"),
            token(r"\frac{d^2}{dx^2} f(x)"),
            token(r"\frac{\partial f}{\partial x}"),
            token(r"\nabla f"),
            token(r"\nabla^2 f"),
            token(r"J_{ij}=\frac{\partial f_i}{\partial x_j}"),
            token(r"\frac{dy}{dx}=\frac{dy}{du}\frac{du}{dx}"),
            token(r"\sum_{i=1}^{n}"),
        ],
    },
    PaletteCategory {
        key: "matrices",
        title: "Matrices & systems",
        tokens: &[
            advanced(r"\begin{pmatrix} a & b \\ c & d \end{pmatrix}"),
            advanced(r"\begin{pmatrix} 1 & 0 & 0 \\ 0 & 1 & 0 \\ 0 & 0 & 1 \end{pmatrix}"),
            advanced(r"\begin{bmatrix} x_1 \\ x_2 \\ \vdots \\ x_n \end{bmatrix}"),
            advanced(r"\begin{cases} ax+by=c \\ dx+ey=f \end{cases}"),
            advanced(r"\det\begin{pmatrix} a & b \\ c & d \end{pmatrix} = ad-bc"),
            token("y=ax+b"),
        ],
    },
    PaletteCategory {
        key: "symbols",
        title: "Greek & operators",
        tokens: &[
            spaced(r"\alpha", r"\alpha "),
            spaced(r"\beta", r"\beta "),
            spaced(r"\gamma", r"\gamma "),
            spaced(r"\lambda", r"\lambda "),
            spaced(r"\mu", r"\mu "),
            spaced(r"\sigma", r"\sigma "),
            spaced(r"\phi", r"\phi "),
            spaced(r"\pi", r"\pi "),
            token("+"),
            token("-"),
            spaced(r"\times", r"\times "),
            spaced(r"\div", r"\div "),
            token("="),
            spaced(r"\ne", r"\ne "),
            spaced(r"\pm", r"\pm "),
            spaced(r"\cdot", r"\cdot "),
            token("<"),
            token(">"),
        ],
    },
];

/// Resolves a token id of the form `<category>-<index>`.
pub fn lookup(id: &str) -> Option<&'static PaletteToken> {
    let (key, index) = id.trim().rsplit_once('-')?;
    let index: usize = index.parse().ok()?;
    CATEGORIES
        .iter()
        .find(|category| category.key == key)?
        .tokens
        .get(index)
}
