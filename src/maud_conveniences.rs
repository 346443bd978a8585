use crate::{listing::Page, validation::FieldErrors};
use maud::{Markup, Render, html};

const INPUT_CLASSES: &str = "shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600";

/// The three dashboards, which also decide which menu and notifications you get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    Secretariat,
    Student,
}

impl Role {
    pub const fn home(self) -> &'static str {
        match self {
            Self::Teacher => "/teacher",
            Self::Secretariat => "/secretariat",
            Self::Student => "/",
        }
    }

    pub const fn audience(self) -> &'static str {
        match self {
            Self::Teacher => "teachers",
            Self::Secretariat => "secretariat",
            Self::Student => "students",
        }
    }

    const fn menu(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Teacher => &[
                ("Dashboard", "/teacher"),
                ("Attendance", "/attendance"),
                ("Grading", "/grading"),
                ("Schedule", "/schedule"),
                ("Messages", "/communications?role=teacher"),
            ],
            Self::Secretariat => &[
                ("Dashboard", "/secretariat"),
                ("Students", "/students"),
                ("Payments", "/payments"),
                ("Admissions", "/admissions"),
                ("Schedule", "/schedule"),
                ("Messages", "/communications?role=secretariat"),
            ],
            Self::Student => &[("Home", "/"), ("Messages", "/communications?role=student")],
        }
    }
}

pub fn render_nav(role: Role) -> Markup {
    html! {
        nav class="w-full bg-gray-800 shadow-md px-6 py-3 flex flex-row items-center justify-between" {
            div class="flex flex-row items-center space-x-4" {
                a href=(role.home()) class="text-xl font-bold" {"myMadrassa"}
                @for (label, href) in role.menu() {
                    a href=(href) class="text-gray-300 hover:text-white" {(label)}
                }
            }
            div class="flex flex-row items-center space-x-4" {
                @if role != Role::Student {
                    div class="relative" {
                        input type="search" name="search" placeholder="Find a student..." class=(INPUT_CLASSES)
                            hx-get="/internal/students/search" hx-trigger="input changed delay:300ms, search" hx-target="#search_results" {}
                        div id="search_results" class="absolute right-0 mt-1 w-72 z-10" {}
                    }
                }
                a href={"/communications?role=" (role_query(role))} hx-get={"/internal/communications/badge?audience=" (role.audience())} hx-trigger="load, sse:communications" {}
            }
        }
    }
}

const fn role_query(role: Role) -> &'static str {
    match role {
        Role::Teacher => "teacher",
        Role::Secretariat => "secretariat",
        Role::Student => "student",
    }
}

pub fn table<const N: usize>(titles: [&'static str; N], items: Vec<[Markup; N]>) -> Markup {
    html! {
        div class="overflow-x-auto" {
            table class="min-w-full bg-gray-800 rounded shadow-md" {
                thead class="bg-gray-700" {
                    tr {
                        @for title in titles {
                            th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                        }
                    }
                }
                tbody {
                    @for row in items {
                        tr {
                            @for col in row {
                                td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        h2 class="text-xl font-semibold mb-2" {(s)}
    }
}

pub fn form_element(id: &'static str, label: &'static str, element: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-sm font-bold mb-2" {(label)}
            (element)
        }
    }
}

pub fn field_error(errors: &FieldErrors, field: &str) -> Markup {
    html! {
        @if let Some(message) = errors.get(field) {
            p class="text-red-400 text-xs italic mt-1" {(message)}
        }
    }
}

/// A labelled `<input>` with its validation message underneath, if there is one.
pub fn simple_form_element(
    id: &'static str,
    label: &'static str,
    required: bool,
    input_type: Option<&'static str>,
    value: &str,
    errors: &FieldErrors,
) -> Markup {
    let border = if errors.get(id).is_some() {
        " border-red-500"
    } else {
        ""
    };

    form_element(
        id,
        label,
        html! {
            input type=(input_type.unwrap_or("text")) id=(id) name=(id) value=(value) required[required]
                class={(INPUT_CLASSES) (border)} {}
            (field_error(errors, id))
        },
    )
}

/// A `<select>` over `options` (value, label), preselecting `selected`.
pub fn select_element(
    id: &'static str,
    label: &'static str,
    placeholder: Option<&'static str>,
    options: impl IntoIterator<Item = (String, String)>,
    selected: &str,
    errors: &FieldErrors,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            select id=(id) name=(id) class=(INPUT_CLASSES) {
                @if let Some(placeholder) = placeholder {
                    option value="" {(placeholder)}
                }
                @for (value, label) in options {
                    option value=(value) selected[value == selected] {(label)}
                }
            }
            (field_error(errors, id))
        },
    )
}

pub fn form_submit_button(text: Option<&str>) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text.unwrap_or("Submit"))
            }
        }
    }
}

/// A modal wrapping a form. Swapping anything else into `#dialog` closes it.
pub fn dialog(heading: &str, body: Markup) -> Markup {
    html! {
        dialog open class="fixed inset-0 m-auto bg-gray-800 text-white rounded shadow-lg p-6 w-full max-w-lg" {
            div class="flex flex-row items-center justify-between" {
                (title(heading))
                button type="button" class="text-gray-400 hover:text-white" onclick="this.closest('dialog').remove()" {"✕"}
            }
            (body)
        }
    }
}

/// Appended out-of-band to `#toasts`, so it can ride along with any other response.
pub fn toast(message: &str, is_error: bool) -> Markup {
    let colour = if is_error { "bg-red-700" } else { "bg-green-700" };

    html! {
        div hx-swap-oob="beforeend:#toasts" {
            div class={"rounded shadow-md px-4 py-2 mb-2 flex flex-row items-center justify-between space-x-4 " (colour)} role="alert" {
                span {(message)}
                button type="button" onclick="this.parentElement.remove()" {"✕"}
            }
        }
    }
}

pub fn status_badge(status: impl Render) -> Markup {
    html! {
        span class="inline-block rounded-full bg-gray-600 px-3 py-1 text-xs font-semibold uppercase" {(status)}
    }
}

/// Page links for a list fragment. The filters form is sent along with every link.
pub fn pagination<T>(page: &Page<T>, fragment_url: &str, filters: &str, target: &str) -> Markup {
    if page.total_pages <= 1 {
        return html! {};
    }
    let link = |n: usize| format!("{fragment_url}?page={n}");

    html! {
        div class="flex flex-row justify-center items-center space-x-2 mt-4" {
            @if page.has_prev() {
                button class="px-3 py-1 rounded bg-gray-700 hover:bg-gray-600" hx-get=(link(page.page - 1)) hx-include=(filters) hx-target=(target) {"‹"}
            }
            @for n in page.window() {
                @if n == page.page {
                    span class="px-3 py-1 rounded bg-blue-600 font-bold" {(n)}
                } @else {
                    button class="px-3 py-1 rounded bg-gray-700 hover:bg-gray-600" hx-get=(link(n)) hx-include=(filters) hx-target=(target) {(n)}
                }
            }
            @if page.has_next() {
                button class="px-3 py-1 rounded bg-gray-700 hover:bg-gray-600" hx-get=(link(page.page + 1)) hx-include=(filters) hx-target=(target) {"›"}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{PAGE_SIZE, paginate};

    #[test]
    fn toast_goes_out_of_band() {
        let rendered = toast("Payment <saved>", false).into_string();
        assert!(rendered.contains(r##"hx-swap-oob="beforeend:#toasts""##));
        assert!(rendered.contains("Payment &lt;saved&gt;"));
        assert!(rendered.contains("bg-green-700"));
        assert!(toast("nope", true).into_string().contains("bg-red-700"));
    }

    #[test]
    fn field_errors_show_next_to_inputs() {
        let mut errors = FieldErrors::default();
        errors.add("email", "Email is required");

        let rendered =
            simple_form_element("email", "Email", true, Some("email"), "", &errors).into_string();
        assert!(rendered.contains("Email is required"));
        assert!(rendered.contains("border-red-500"));

        let clean = simple_form_element("first_name", "First name", true, None, "Amina", &errors)
            .into_string();
        assert!(!clean.contains("text-red-400"));
        assert!(clean.contains(r#"value="Amina""#));
    }

    #[test]
    fn pagination_links_follow_the_window() {
        let page = paginate((0..120).collect::<Vec<_>>(), 7, PAGE_SIZE);
        let rendered =
            pagination(&page, "/internal/students", "#student_filters", "#students").into_string();

        for n in 5..=9 {
            assert!(rendered.contains(&format!(">{n}<")));
        }
        assert!(!rendered.contains("page=4\""));
        assert!(!rendered.contains("page=10\""));
        assert!(rendered.contains("page=6"));
        assert!(rendered.contains("page=8"));
        assert!(rendered.contains(r##"hx-include="#student_filters""##));
    }

    #[test]
    fn single_page_has_no_links() {
        let page = paginate(vec![1, 2, 3], 1, PAGE_SIZE);
        assert!(pagination(&page, "/x", "#f", "#x").into_string().is_empty());
    }
}
