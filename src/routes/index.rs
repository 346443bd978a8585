use crate::{
    data::{DataType, student::Student},
    error::MadrassaResult,
    maud_conveniences::Role,
    state::MadrassaState,
};
use axum::extract::State;
use maud::{Markup, html};

/// No logins: you pick a dashboard, students pick themselves.
pub async fn get_index_route(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let students = Student::get_all(&state).await?;

    Ok(state.render(Role::Student, html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full mx-auto" {
            h1 class="text-2xl font-semibold mb-6 text-center" {
                "myMadrassa"
            }

            div class="flex flex-row space-x-4 justify-center" {
                a href="/teacher" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                    "Teacher"
                }
                a href="/secretariat" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                    "Secretariat"
                }
            }

            @if !students.is_empty() {
                form action="/student" method="get" class="mt-6 flex flex-row space-x-2" {
                    select name="id" class="rounded py-2 px-3 bg-gray-700 border border-gray-600 flex-grow" {
                        @for student in &students {
                            option value=(student.id) {(student) " (" (student.student_code) ")"}
                        }
                    }
                    button type="submit" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Student"}
                }
            }
        }
    }))
}
